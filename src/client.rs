//! HTTP client for the device's update API.
//!
//! This module provides:
//!
//! - `DeviceClient`: HTTP client wrapper carrying the device address and session token
//! - Deserialized device responses (`InstallReport`, `SystemVersion`, acknowledgment markers)
//! - The production transport behind the update session's wire operations
//!
//! Every request carries the session token verbatim in the `Authorization`
//! header; the device does not use a `Bearer` scheme.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::sync::watch;

use crate::error::UpdateError;
use crate::session::{ProgressCallback, UpdateApi};

/// User agent for device requests
const USER_AGENT: &str = concat!("otactl/", env!("CARGO_PKG_VERSION"));

/// Chunk size for streaming uploads
const CHUNK_SIZE: usize = 32 * 1024;

/// Timeout for a single progress query; a hung socket counts as a failed
/// poll attempt instead of stalling the loop
const PROGRESS_TIMEOUT_SECS: u64 = 10;

/// Upload acknowledgment from the device
#[derive(Debug, Clone, Deserialize)]
pub struct UploadAck {
    pub status: String,
}

/// Response to a cancellation request
#[derive(Debug, Clone, Deserialize)]
pub struct CancelAck {
    pub status: String,
}

impl CancelAck {
    /// Whether the device actually confirmed the cancellation
    pub fn confirmed(&self) -> bool {
        self.status == "cancelled"
    }
}

/// Classification of an installer progress report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    InProgress,
    Done,
    Failed,
}

/// A progress report from the device installer.
///
/// The installer emits more statuses than the terminal two (`uploading`,
/// `installing`, `merging`, ...); anything that is not `done` or `failed`
/// counts as in-progress.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallReport {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: String,
    /// Recent installer output lines, when the device provides them
    #[serde(default)]
    pub output: Vec<String>,
}

impl InstallReport {
    pub fn kind(&self) -> ReportKind {
        match self.status.as_str() {
            "done" => ReportKind::Done,
            "failed" => ReportKind::Failed,
            _ => ReportKind::InProgress,
        }
    }

    /// Progress as a sanitized integer percent.
    ///
    /// Absent values stay absent; present values default to 0 when not
    /// finite and are clamped into 0..=100.
    pub fn percent(&self) -> Option<u8> {
        self.progress.map(|value| {
            if value.is_finite() {
                value.round().clamp(0.0, 100.0) as u8
            } else {
                0
            }
        })
    }
}

/// Device identity and build information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemVersion {
    pub version: String,
    pub linux_version: String,
    pub build_time: String,
    pub arch: String,
    pub cpu_info: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Serialize)]
struct UrlFetchRequest<'a> {
    url: &'a str,
}

/// Parse a JSON response body, folding parse failures into a protocol error
fn parse_response<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, UpdateError> {
    serde_json::from_str(body)
        .map_err(|e| UpdateError::Protocol(format!("invalid response body: {}", e)))
}

/// Check the upload acknowledgment marker
fn verify_upload_ack(body: &str) -> Result<(), UpdateError> {
    let ack: UploadAck = parse_response(body)?;
    if ack.status == "upload_complete" {
        Ok(())
    } else {
        Err(UpdateError::Protocol(format!(
            "unexpected upload status: {}",
            ack.status
        )))
    }
}

/// Integer percent of a partially sent payload
fn transfer_percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    ((sent as f64 / total as f64) * 100.0).round().min(100.0) as u8
}

/// Chunked read stream over an opened package file, reporting cumulative
/// progress after each chunk
fn package_stream(
    file: tokio::fs::File,
    total: u64,
    progress: ProgressCallback,
) -> impl futures::Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + 'static {
    futures::stream::unfold((file, 0u64), move |(mut file, sent)| {
        let progress = Arc::clone(&progress);
        async move {
            let mut buf = vec![0u8; CHUNK_SIZE];
            match file.read(&mut buf).await {
                Ok(0) => None,
                Ok(n) => {
                    buf.truncate(n);
                    let sent = sent + n as u64;
                    if total > 0 {
                        progress(transfer_percent(sent, total));
                    }
                    Some((Ok(buf), (file, sent)))
                }
                Err(e) => Some((Err(e), (file, sent))),
            }
        }
    })
}

/// HTTP client for one device
#[derive(Clone)]
pub struct DeviceClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl DeviceClient {
    /// Create a client for the device at `base_url`, authenticating with
    /// `token` when present
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, UpdateError> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.http.request(method, &url);
        if let Some(token) = &self.token {
            builder = builder.header(reqwest::header::AUTHORIZATION, token.as_str());
        }
        builder
    }

    /// Authenticate against the device and return the session token
    pub async fn login(&self, username: &str, password: &str) -> Result<String, UpdateError> {
        let response = self
            .request(Method::POST, "/login")
            .json(&LoginRequest { username, password })
            .send()
            .await?;
        let response = response.error_for_status()?;
        let body = response.text().await?;
        let login: LoginResponse = parse_response(&body)?;

        tracing::info!("Logged in to {}", self.base_url);
        Ok(login.token)
    }

    /// Fetch the device's version and build information
    pub async fn system_version(&self) -> Result<SystemVersion, UpdateError> {
        let response = self.request(Method::GET, "/version").send().await?;
        let response = response.error_for_status()?;
        let body = response.text().await?;
        parse_response(&body)
    }

    /// Reboot the device
    pub async fn reboot(&self) -> Result<(), UpdateError> {
        let response = self.request(Method::POST, "/reboot").send().await?;
        response.error_for_status()?;

        tracing::info!("Reboot requested");
        Ok(())
    }

    /// Factory-reset the device. Destructive; callers must confirm with the
    /// operator before getting here.
    pub async fn factory_reset(&self) -> Result<(), UpdateError> {
        let response = self.request(Method::POST, "/reset").send().await?;
        response.error_for_status()?;

        tracing::info!("Factory reset requested");
        Ok(())
    }
}

#[async_trait]
impl UpdateApi for DeviceClient {
    async fn push_artifact(
        &self,
        artifact: &Path,
        progress: ProgressCallback,
        mut abort: watch::Receiver<bool>,
    ) -> Result<(), UpdateError> {
        let file = tokio::fs::File::open(artifact).await?;
        let total = file.metadata().await?.len();
        let file_name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "update.raucb".to_string());

        tracing::info!(
            "Uploading {} ({} bytes) to {}",
            file_name,
            total,
            self.base_url
        );

        let stream = package_stream(file, total, progress);
        let part = multipart::Part::stream_with_length(reqwest::Body::wrap_stream(stream), total)
            .file_name(file_name)
            .mime_str("application/octet-stream")?;
        let form = multipart::Form::new().part("updateFile", part);

        let request = self
            .request(Method::POST, "/upload_update")
            .multipart(form)
            .send();

        // Dropping the request future tears down the connection, which is
        // exactly what an abort should do mid-upload.
        let response = tokio::select! {
            result = request => result?,
            Ok(_) = abort.wait_for(|aborted| *aborted) => {
                tracing::info!("Upload aborted by cancellation");
                return Err(UpdateError::Cancelled);
            }
        };

        if let Err(e) = response.error_for_status_ref() {
            tracing::warn!("Upload rejected: HTTP {}", response.status());
            return Err(UpdateError::Transport(e));
        }

        let body = response.text().await?;
        verify_upload_ack(&body)?;

        tracing::info!("Upload acknowledged by device");
        Ok(())
    }

    async fn request_url_fetch(&self, url: &str) -> Result<(), UpdateError> {
        tracing::info!("Directing device to fetch {}", url);

        let response = self
            .request(Method::POST, "/upload_update")
            .json(&UrlFetchRequest { url })
            .send()
            .await?;
        response.error_for_status()?;
        Ok(())
    }

    async fn install_progress(&self) -> Result<InstallReport, UpdateError> {
        let response = self
            .request(Method::GET, "/upgrade_progress")
            .timeout(Duration::from_secs(PROGRESS_TIMEOUT_SECS))
            .send()
            .await?;
        let response = response.error_for_status()?;
        let body = response.text().await?;
        parse_response(&body)
    }

    async fn cancel_install(&self) -> Result<CancelAck, UpdateError> {
        let response = self.request(Method::POST, "/cancel_upgrade").send().await?;
        let response = response.error_for_status()?;
        let body = response.text().await?;
        parse_response(&body)
    }
}
