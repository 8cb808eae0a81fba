//! AudioShake Tasks API client
//!
//! Four operations against the remote service: upload an asset, create a
//! task, fetch a task snapshot, download an output link. Error mapping is
//! uniform: 401 → `Error::Auth`, other non-success → `Error::Api`,
//! network-level failure → `Error::Transport`.

use crate::config::Credential;
use crate::error::{truncate_for_display, Error, Result};
use crate::types::{CreateTaskRequest, CreateTaskResponse, Target, TaskSnapshot, UploadResponse};
use futures::StreamExt;
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::codec::{BytesCodec, FramedRead};

/// Official Tasks API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.audioshake.ai";

const USER_AGENT: &str = concat!("voxsep/", env!("CARGO_PKG_VERSION"));
const API_KEY_HEADER: &str = "x-api-key";

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);
const CREATE_TIMEOUT: Duration = Duration::from_secs(60);
const STATUS_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// AudioShake API client
pub struct ApiClient {
    http_client: reqwest::Client,
    base_url: String,
    credential: Credential,
}

impl ApiClient {
    pub fn new(credential: Credential) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, credential)
    }

    /// Client against a non-default base URL (local mock servers in tests)
    pub fn with_base_url(base_url: impl Into<String>, credential: Credential) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(transport_err)?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential,
        })
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Upload an audio file via `POST /assets`, returning the asset id.
    ///
    /// The file is streamed as the multipart `file` part rather than read
    /// into memory.
    pub async fn upload(&self, path: &Path) -> Result<String> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::InvalidInput(format!("not a file path: {}", path.display()))
            })?;

        let file = tokio::fs::File::open(path).await?;
        let stream = FramedRead::new(file, BytesCodec::new());
        let part = reqwest::multipart::Part::stream(reqwest::Body::wrap_stream(stream))
            .file_name(file_name);
        let form = reqwest::multipart::Form::new().part("file", part);

        tracing::debug!(path = %path.display(), "Uploading audio file");

        let response = self
            .http_client
            .post(format!("{}/assets", self.base_url))
            .header(API_KEY_HEADER, self.credential.get())
            .multipart(form)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await
            .map_err(transport_err)?;

        if !response.status().is_success() {
            return Err(reject(response).await);
        }

        let upload: UploadResponse = response.json().await.map_err(transport_err)?;
        tracing::info!(asset_id = %upload.id, "Upload complete");
        Ok(upload.id)
    }

    /// Create a separation task via `POST /tasks`, returning the task id.
    /// The API answers 200 or 201 on success.
    pub async fn create_task(&self, asset_id: &str, targets: &[Target]) -> Result<String> {
        if targets.is_empty() {
            return Err(Error::InvalidInput(
                "at least one target is required".to_string(),
            ));
        }

        let payload = CreateTaskRequest { asset_id, targets };

        let response = self
            .http_client
            .post(format!("{}/tasks", self.base_url))
            .header(API_KEY_HEADER, self.credential.get())
            .json(&payload)
            .timeout(CREATE_TIMEOUT)
            .send()
            .await
            .map_err(transport_err)?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {}
            _ => return Err(reject(response).await),
        }

        let created: CreateTaskResponse = response.json().await.map_err(transport_err)?;
        tracing::info!(task_id = %created.id, "Task created");
        Ok(created.id)
    }

    /// Fetch one task snapshot via `GET /tasks/{id}`. Polling cadence is the
    /// caller's job.
    pub async fn get_task(&self, task_id: &str) -> Result<TaskSnapshot> {
        let response = self
            .http_client
            .get(format!("{}/tasks/{}", self.base_url, task_id))
            .header(API_KEY_HEADER, self.credential.get())
            .timeout(STATUS_TIMEOUT)
            .send()
            .await
            .map_err(transport_err)?;

        if !response.status().is_success() {
            return Err(reject(response).await);
        }

        response.json().await.map_err(transport_err)
    }

    /// Stream an output link to `dest` in bounded chunks.
    ///
    /// Output links are pre-signed, so no credential header is sent. The
    /// body lands in a `.part` temp file that is renamed on success and
    /// removed on failure; a failed transfer never leaves a partial file at
    /// `dest`.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self
            .http_client
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(transport_err)?;

        if response.status() != StatusCode::OK {
            return Err(reject(response).await);
        }

        let tmp = part_path(dest);
        if let Err(e) = write_stream(response, &tmp).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        tokio::fs::rename(&tmp, dest).await?;

        tracing::debug!(dest = %dest.display(), "Download complete");
        Ok(())
    }
}

/// Map a non-success response into the error taxonomy, consuming the body.
async fn reject(response: reqwest::Response) -> Error {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Error::Auth;
    }

    let body = response.text().await.unwrap_or_default();
    Error::Api {
        status: status.as_u16(),
        body: truncate_for_display(&body),
    }
}

fn transport_err(error: reqwest::Error) -> Error {
    Error::Transport(truncate_for_display(&error.to_string()))
}

fn part_path(dest: &Path) -> PathBuf {
    let mut raw = dest.as_os_str().to_owned();
    raw.push(".part");
    PathBuf::from(raw)
}

async fn write_stream(response: reqwest::Response, tmp: &Path) -> Result<()> {
    let mut file = tokio::fs::File::create(tmp).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let bytes = chunk.map_err(transport_err)?;
        file.write_all(&bytes).await?;
    }
    file.flush().await?;
    Ok(())
}
