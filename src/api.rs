// API client module: a small blocking HTTP client that uploads deploy
// archives to the Hostme API. The workflow only sees the `Uploader` trait;
// `ApiClient` is the real transport behind it.

use crate::cancel::{CancelToken, CancellableReader};
use crate::config::Config;
use crate::error::DeployError;
use reqwest::blocking::{multipart, Client, Response};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use std::time::Instant;

/// One upload of a finished archive.
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    pub slug: &'a str,
    pub token: &'a str,
    pub archive: &'a Path,
}

/// Sends a deploy archive to the server.
///
/// Implementations return `Ok(())` on any 2xx, `DeployError::Unauthorized`
/// on 401, `DeployError::ServerRejected` on other statuses and
/// `DeployError::Cancelled` when `cancel` fired before or during the call.
pub trait Uploader {
    fn upload(&self, request: UploadRequest<'_>, cancel: &CancelToken) -> Result<(), DeployError>;
}

/// Error body returned by the API on failures.
#[derive(Deserialize, Debug)]
struct ErrorBody {
    error: Option<String>,
}

/// Blocking client bound to one API base URL.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Build the client from the loaded configuration. Certificate checks
    /// are only relaxed on this client, and only when configured.
    pub fn new(config: &Config) -> Result<Self, DeployError> {
        let mut builder = Client::builder().timeout(config.upload_timeout);
        if config.accept_invalid_certs {
            tracing::warn!("TLS certificate verification disabled for deploy requests");
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|err| DeployError::Transport(format!("failed to build HTTP client: {err}")))?;
        Ok(ApiClient {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST` target for a project.
    pub fn deploy_url(&self, slug: &str) -> String {
        format!("{}/api/websites/{}/deploy_on_push", self.base_url, slug)
    }
}

impl Uploader for ApiClient {
    fn upload(&self, request: UploadRequest<'_>, cancel: &CancelToken) -> Result<(), DeployError> {
        if cancel.is_cancelled() {
            return Err(DeployError::Cancelled);
        }
        let url = self.deploy_url(request.slug);

        let file = File::open(request.archive).map_err(|err| {
            DeployError::Archive(format!("failed to open {}: {err}", request.archive.display()))
        })?;
        let len = file
            .metadata()
            .map_err(|err| DeployError::Archive(err.to_string()))?
            .len();
        let part = multipart::Part::reader_with_length(
            CancellableReader::new(file, cancel.clone()),
            len,
        )
        .file_name(format!("{}.zip", request.slug))
        .mime_str("application/zip")
        .map_err(|err| DeployError::Transport(err.to_string()))?;
        let form = multipart::Form::new().part("file", part);

        tracing::info!(%url, bytes = len, "uploading archive");
        let started = Instant::now();
        let res = self
            .client
            .post(&url)
            .bearer_auth(request.token)
            .header(ACCEPT, "application/json")
            .multipart(form)
            .send();

        let res = match res {
            Ok(res) => res,
            Err(_) if cancel.is_cancelled() => return Err(DeployError::Cancelled),
            Err(err) => return Err(DeployError::Transport(err.to_string())),
        };
        tracing::info!(
            status = res.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "deploy response"
        );
        check_status(res)
    }
}

/// Map a response onto the workflow's view of it.
fn check_status(res: Response) -> Result<(), DeployError> {
    let status = res.status();
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(DeployError::Unauthorized);
    }
    let txt = res.text().unwrap_or_default();
    Err(DeployError::ServerRejected {
        status: status.as_u16(),
        message: error_message(&txt),
    })
}

/// Pull the `error` string out of a JSON error body.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.error)
        .map(|message| message.trim().to_string())
        .filter(|message| !message.is_empty())
}
