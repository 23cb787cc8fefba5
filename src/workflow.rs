// Deploy workflow engine.
//
// The state machine behind "Deploy with Hostme". Each `State` carries what
// has been gathered so far; `advance` performs exactly one step and returns
// the next state. It owns no I/O of its own: prompts go through `Ui`,
// persistence through `SettingsStore`, the network through `Uploader`.

use crate::api::{UploadRequest, Uploader};
use crate::archive::{self, ArchiveFile};
use crate::cancel::CancelToken;
use crate::config::{Config, FALLBACK_PROJECT_NAME};
use crate::error::DeployError;
use crate::slug::slugify;
use crate::store::{workspace_name_key, Scope, SettingsStore, DETACHED_NAME_KEY, TOKEN_KEY};
use std::path::PathBuf;
use std::time::Instant;

/// A text prompt.
#[derive(Debug, Clone, Copy)]
pub struct InputRequest<'a> {
    pub title: &'a str,
    /// Pre-filled value.
    pub value: Option<&'a str>,
    /// Mask the typed text.
    pub secret: bool,
}

/// The user-facing primitives the workflow needs from its host.
pub trait Ui {
    /// Ask for a line of text. `None` when the user declined.
    fn input(&mut self, request: InputRequest<'_>) -> Result<Option<String>, DeployError>;

    /// Let the user pick folders. Empty when nothing was chosen.
    fn pick_folders(&mut self) -> Result<Vec<PathBuf>, DeployError>;

    fn show_info(&mut self, message: &str);

    /// Show an error, optionally offering `action`. Returns `true` when the
    /// user took the action.
    fn show_error(&mut self, message: &str, action: Option<&str>) -> Result<bool, DeployError>;

    fn show_success(&mut self, message: &str, link: &str);

    fn report_progress(&mut self, percent: u8, message: &str);

    /// A cancellable task starts; the host may wire a cancel control to
    /// `cancel`. Calling it while a task is running is a no-op.
    fn begin_task(&mut self, cancel: &CancelToken);

    /// The task is over, or about to be interrupted by a prompt. Idempotent.
    fn end_task(&mut self);
}

/// Workflow steps.
#[derive(Debug)]
pub enum State {
    AwaitingToken,
    AwaitingProjectName {
        token: String,
    },
    AwaitingFolderSelection {
        token: String,
        slug: String,
    },
    SizeCheck {
        token: String,
        slug: String,
        root: PathBuf,
    },
    Archiving {
        token: String,
        slug: String,
        root: PathBuf,
        total: u64,
    },
    Uploading {
        token: String,
        slug: String,
        archive: ArchiveFile,
    },
    /// The server rejected the token; the archive is kept for another try.
    Retrying {
        slug: String,
        archive: ArchiveFile,
    },
    Done {
        url: String,
    },
    Cancelled,
    NothingSelected,
    Failed(DeployError),
}

impl State {
    /// Step name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            State::AwaitingToken => "awaiting_token",
            State::AwaitingProjectName { .. } => "awaiting_project_name",
            State::AwaitingFolderSelection { .. } => "awaiting_folder_selection",
            State::SizeCheck { .. } => "size_check",
            State::Archiving { .. } => "archiving",
            State::Uploading { .. } => "uploading",
            State::Retrying { .. } => "retrying",
            State::Done { .. } => "done",
            State::Cancelled => "cancelled",
            State::NothingSelected => "nothing_selected",
            State::Failed(_) => "failed",
        }
    }
}

/// How one deploy invocation ended.
#[derive(Debug)]
pub enum Outcome {
    Deployed { url: String },
    Cancelled,
    NothingSelected,
    Failed(DeployError),
}

impl Outcome {
    pub fn is_deployed(&self) -> bool {
        matches!(self, Outcome::Deployed { .. })
    }
}

/// One deploy attempt.
pub struct DeployWorkflow<'a, U: Ui + ?Sized, S: SettingsStore + ?Sized, P: Uploader + ?Sized> {
    ui: &'a mut U,
    store: &'a mut S,
    uploader: &'a P,
    config: &'a Config,
    cancel: CancelToken,
}

impl<'a, U, S, P> DeployWorkflow<'a, U, S, P>
where
    U: Ui + ?Sized,
    S: SettingsStore + ?Sized,
    P: Uploader + ?Sized,
{
    pub fn new(ui: &'a mut U, store: &'a mut S, uploader: &'a P, config: &'a Config) -> Self {
        Self {
            ui,
            store,
            uploader,
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Run from `AwaitingToken` to a terminal state.
    pub fn run(mut self) -> Outcome {
        let mut state = State::AwaitingToken;
        let outcome = loop {
            state = match state {
                State::Done { url } => break Outcome::Deployed { url },
                State::Cancelled => break Outcome::Cancelled,
                State::NothingSelected => break Outcome::NothingSelected,
                State::Failed(err) => break Outcome::Failed(err),
                other => self.advance(other),
            };
        };
        self.ui.end_task();
        outcome
    }

    /// Perform one step.
    pub fn advance(&mut self, state: State) -> State {
        let from = state.name();
        let result = match state {
            State::AwaitingToken => self.step_token(),
            State::AwaitingProjectName { token } => self.step_project_name(token),
            State::AwaitingFolderSelection { token, slug } => self.step_folder(token, slug),
            State::SizeCheck { token, slug, root } => self.step_size_check(token, slug, root),
            State::Archiving {
                token,
                slug,
                root,
                total,
            } => self.step_archive(token, slug, root, total),
            State::Uploading {
                token,
                slug,
                archive,
            } => self.step_upload(token, slug, archive),
            State::Retrying { slug, archive } => self.step_retry(slug, archive),
            terminal => Ok(terminal),
        };
        let next = match result {
            Ok(next) => next,
            Err(err) => self.fail(err),
        };
        if !matches!(next, State::Uploading { .. }) {
            self.ui.end_task();
        }
        tracing::debug!(from, to = next.name(), "deploy transition");
        next
    }

    fn fail(&mut self, err: DeployError) -> State {
        self.ui.end_task();
        match err {
            DeployError::Cancelled => State::Cancelled,
            err if err.is_user_abort() => {
                self.ui.show_info(&err.user_message());
                State::Failed(err)
            }
            err => {
                tracing::warn!(error = %err, "deploy failed");
                if let Err(prompt_err) = self.ui.show_error(&err.user_message(), None) {
                    tracing::warn!(error = %prompt_err, "could not show deploy error");
                }
                State::Failed(err)
            }
        }
    }

    /// Prompt for a token and persist it. `None` when declined or empty.
    fn prompt_token(&mut self, title: &str) -> Result<Option<String>, DeployError> {
        let answer = self.ui.input(InputRequest {
            title,
            value: None,
            secret: true,
        })?;
        let Some(token) = answer.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        self.store.set(&Scope::Global, TOKEN_KEY, &token)?;
        Ok(Some(token))
    }

    fn step_token(&mut self) -> Result<State, DeployError> {
        let stored = self
            .store
            .get(&Scope::Global, TOKEN_KEY)?
            .filter(|t| !t.trim().is_empty());
        if let Some(token) = stored {
            return Ok(State::AwaitingProjectName { token });
        }
        match self.prompt_token("Please, provide your Hostme bearer token")? {
            Some(token) => Ok(State::AwaitingProjectName { token }),
            None => {
                self.ui.show_info("Invalid bearer token");
                Ok(State::Failed(DeployError::MissingToken))
            }
        }
    }

    fn step_project_name(&mut self, token: String) -> Result<State, DeployError> {
        let workspace = self.config.workspace.as_deref();
        let scope = Scope::for_workspace(workspace);
        let derived = workspace
            .and_then(|path| path.file_name())
            .map(|name| slugify(&name.to_string_lossy()));
        let (key, default) = match derived {
            Some(derived) => {
                let key = workspace_name_key(&derived);
                let default = if derived.is_empty() {
                    FALLBACK_PROJECT_NAME.to_string()
                } else {
                    derived
                };
                (key, default)
            }
            None => (DETACHED_NAME_KEY.to_string(), FALLBACK_PROJECT_NAME.to_string()),
        };
        let prefill = self.store.get(&scope, &key)?.unwrap_or(default);

        let answer = self.ui.input(InputRequest {
            title: "Enter the name of your website",
            value: Some(&prefill),
            secret: false,
        })?;
        let slug = answer.map(|name| slugify(&name)).unwrap_or_default();
        if slug.is_empty() {
            self.ui
                .show_info("A website name is required to deploy with Hostme");
            return Ok(State::Failed(DeployError::EmptyProjectName));
        }
        self.store.set(&scope, &key, &slug)?;
        Ok(State::AwaitingFolderSelection { token, slug })
    }

    fn step_folder(&mut self, token: String, slug: String) -> Result<State, DeployError> {
        let mut folders = self.ui.pick_folders()?.into_iter();
        match folders.next() {
            Some(root) => Ok(State::SizeCheck { token, slug, root }),
            None => Ok(State::NothingSelected),
        }
    }

    fn step_size_check(
        &mut self,
        token: String,
        slug: String,
        root: PathBuf,
    ) -> Result<State, DeployError> {
        let size = archive::folder_size(&root)?;
        let limit = self.config.max_upload_bytes;
        tracing::info!(root = %root.display(), size, limit, "measured deploy folder");
        if size <= limit {
            return Ok(State::Archiving {
                token,
                slug,
                root,
                total: size,
            });
        }
        let err = DeployError::SizeLimitExceeded { size, limit };
        if self
            .ui
            .show_error(&err.user_message(), Some("Select another folder"))?
        {
            return Ok(State::AwaitingFolderSelection { token, slug });
        }
        Ok(State::Failed(err))
    }

    fn step_archive(
        &mut self,
        token: String,
        slug: String,
        root: PathBuf,
        total: u64,
    ) -> Result<State, DeployError> {
        if self.cancel.is_cancelled() {
            return Ok(State::Cancelled);
        }
        self.ui.begin_task(&self.cancel);
        self.ui.report_progress(0, "Archiving");

        let dest = self.config.archive_dir.join(format!("{slug}.zip"));
        let started = Instant::now();
        let ui = &mut *self.ui;
        let mut last = 0u8;
        let archive = archive::zip_folder(&root, &dest, &self.cancel, |done| {
            let percent = if total == 0 {
                50
            } else {
                (done.min(total) * 50 / total) as u8
            };
            if percent != last {
                last = percent;
                ui.report_progress(percent, "Archiving");
            }
        })?;
        tracing::info!(
            path = %archive.path().display(),
            bytes = archive.size().unwrap_or(0),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "archive written"
        );
        self.ui.report_progress(50, "Uploading");

        if self.cancel.is_cancelled() {
            archive.remove();
            return Ok(State::Cancelled);
        }
        Ok(State::Uploading {
            token,
            slug,
            archive,
        })
    }

    fn step_upload(
        &mut self,
        token: String,
        slug: String,
        archive: ArchiveFile,
    ) -> Result<State, DeployError> {
        if self.cancel.is_cancelled() {
            archive.remove();
            return Ok(State::Cancelled);
        }
        self.ui.begin_task(&self.cancel);
        let request = UploadRequest {
            slug: &slug,
            token: &token,
            archive: archive.path(),
        };
        match self.uploader.upload(request, &self.cancel) {
            Ok(()) => {
                self.ui.report_progress(100, "Deployed");
                archive.remove();
                self.ui.end_task();
                let url = self.config.site_url(&slug);
                self.ui
                    .show_success(&format!("{slug} has been deployed"), &url);
                Ok(State::Done { url })
            }
            Err(DeployError::Unauthorized) => {
                tracing::info!(%slug, "bearer token rejected");
                self.store.remove(&Scope::Global, TOKEN_KEY)?;
                Ok(State::Retrying { slug, archive })
            }
            Err(DeployError::Cancelled) => {
                archive.remove();
                Ok(State::Cancelled)
            }
            Err(err) => {
                archive.remove();
                self.ui.end_task();
                tracing::warn!(error = %err, %slug, "deploy rejected");
                let action = err.is_retryable().then_some("Try again");
                if self.ui.show_error(&err.user_message(), action)? {
                    // The restarted attempt gets its own cancel flag.
                    self.cancel = CancelToken::new();
                    return Ok(State::AwaitingToken);
                }
                Ok(State::Failed(err))
            }
        }
    }

    fn step_retry(&mut self, slug: String, archive: ArchiveFile) -> Result<State, DeployError> {
        self.ui.end_task();
        let token = self.prompt_token(
            "An error occurred! Your token was rejected, please provide your Hostme bearer token",
        )?;
        match token {
            Some(token) => Ok(State::Uploading {
                token,
                slug,
                archive,
            }),
            None => {
                archive.remove();
                let err = DeployError::Unauthorized;
                self.ui.show_error(&err.user_message(), None)?;
                Ok(State::Failed(err))
            }
        }
    }
}
