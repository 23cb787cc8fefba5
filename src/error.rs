// Error types for the deploy workflow.

/// Everything that can end a deploy attempt.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("no bearer token provided")]
    MissingToken,

    #[error("project name cannot be empty")]
    EmptyProjectName,

    #[error("folder is {size} bytes, above the {limit} bytes upload limit")]
    SizeLimitExceeded { size: u64, limit: u64 },

    #[error("the bearer token was rejected")]
    Unauthorized,

    #[error("deploy rejected by server (HTTP {status}): {}", .message.as_deref().unwrap_or("no details"))]
    ServerRejected { status: u16, message: Option<String> },

    #[error("transport failed: {0}")]
    Transport(String),

    #[error("deploy cancelled")]
    Cancelled,

    #[error("archive error: {0}")]
    Archive(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("prompt failed: {0}")]
    Prompt(String),
}

impl DeployError {
    /// Declined or empty prompts. Shown as information, not as an error.
    pub fn is_user_abort(&self) -> bool {
        matches!(self, DeployError::MissingToken | DeployError::EmptyProjectName)
    }

    /// Whether rerunning the whole workflow may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DeployError::ServerRejected { .. } | DeployError::Transport(_)
        )
    }

    /// Text shown to the user for a failed deploy.
    pub fn user_message(&self) -> String {
        match self {
            DeployError::SizeLimitExceeded { size, limit } => format!(
                "The selected folder weighs {:.1} MB, Hostme accepts at most {:.1} MB.",
                *size as f64 / 1_000_000.0,
                *limit as f64 / 1_000_000.0
            ),
            DeployError::ServerRejected {
                message: Some(message),
                ..
            } => message.clone(),
            DeployError::ServerRejected { status, .. } => {
                format!("Deploy failed with HTTP status {status}.")
            }
            DeployError::Unauthorized => "Your Hostme bearer token is invalid.".to_string(),
            other => format!("Deploy failed: {other}"),
        }
    }
}
