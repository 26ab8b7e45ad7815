//! Google Drive storage client for Rust
//!
//! Uploads shop files (vehicle photos, documents, signatures) to Drive,
//! shares them by link and hands back a public URL that entities store
//! as an opaque string.

use autoshop_rust_auth::{AuthError, AuthorizedClient};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::{debug, info};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use url::Url;

/// Default API host
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";

/// MIME type Drive uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Result type
pub type Result<T> = std::result::Result<T, DriveError>;

/// Error type
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("API error: {message} (Status: {status})")]
    ApiError { message: String, status: StatusCode },

    #[error("Auth error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),
}

impl DriveError {
    /// Whether the request never got an answer from the API
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            DriveError::NetworkError(_) | DriveError::AuthError(AuthError::NetworkError(_))
        )
    }

    /// Whether the storage quota is exhausted
    pub fn is_quota_exceeded(&self) -> bool {
        match self {
            DriveError::ApiError { message, status } => {
                *status == StatusCode::FORBIDDEN
                    && (message.contains("storageQuotaExceeded") || message.contains("quota"))
            }
            _ => false,
        }
    }
}

/// A file stored on Drive
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: Option<String>,
    pub web_view_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Public link for a file id
pub fn public_url(file_id: &str) -> String {
    format!("https://drive.google.com/uc?export=view&id={}", file_id)
}

/// Extract the file id from a Drive link, or return the input when it
/// already is a bare id.
///
/// Understands `...?id=<id>` and `.../d/<id>/...` links.
pub fn file_id_from_url(file_or_url: &str) -> Option<String> {
    let Ok(url) = Url::parse(file_or_url) else {
        let trimmed = file_or_url.trim();
        return (!trimmed.is_empty() && !trimmed.contains('/')).then(|| trimmed.to_string());
    };

    if let Some((_, id)) = url.query_pairs().find(|(k, _)| k == "id") {
        return Some(id.into_owned());
    }

    let segments: Vec<&str> = url.path_segments()?.collect();
    segments
        .iter()
        .position(|s| *s == "d")
        .and_then(|i| segments.get(i + 1))
        .filter(|id| !id.is_empty())
        .map(|id| id.to_string())
}

/// Decode a `data:<mime>;base64,<payload>` URL into its MIME type and bytes
pub fn decode_data_url(data_url: &str) -> Result<(String, Vec<u8>)> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| DriveError::InvalidDataUrl("missing data: prefix".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| DriveError::InvalidDataUrl("missing payload".to_string()))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| DriveError::InvalidDataUrl("only base64 payloads are supported".to_string()))?;
    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| DriveError::InvalidDataUrl(e.to_string()))?;

    let mime = if mime.is_empty() {
        "application/octet-stream"
    } else {
        mime
    };
    Ok((mime.to_string(), bytes))
}

/// Drive client
#[derive(Clone)]
pub struct DriveClient {
    base_url: String,
    client: AuthorizedClient,
    folders: Arc<RwLock<HashMap<String, String>>>,
}

impl DriveClient {
    pub fn new(client: AuthorizedClient) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, client)
    }

    pub fn with_base_url(base_url: &str, client: AuthorizedClient) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            folders: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn check(response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(DriveError::FileNotFound(what.to_string()));
        }
        let message = response.text().await?;
        Err(DriveError::ApiError { message, status })
    }

    /// Upload bytes and share the file by link.
    ///
    /// The returned file carries `web_view_link`; use [`public_url`] with the
    /// id for an embeddable link.
    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        name: &str,
        mime_type: &str,
        folder_id: Option<&str>,
    ) -> Result<DriveFile> {
        let url = format!("{}/upload/drive/v3/files", self.base_url);
        let mut metadata = json!({ "name": name, "mimeType": mime_type });
        if let Some(folder_id) = folder_id {
            metadata["parents"] = json!([folder_id]);
        }
        let metadata = serde_json::to_string(&metadata)?;

        debug!("Uploading {} ({} bytes)", name, bytes.len());
        let response = self
            .client
            .send(|http| {
                // multipart bodies are consumed on send, rebuild per attempt
                let metadata_part = Part::text(metadata.clone())
                    .mime_str("application/json; charset=UTF-8")
                    .unwrap_or_else(|_| Part::text(metadata.clone()));
                let file_part = Part::bytes(bytes.clone()).file_name(name.to_string());
                let file_part = match file_part.mime_str(mime_type) {
                    Ok(part) => part,
                    Err(_) => Part::bytes(bytes.clone()).file_name(name.to_string()),
                };
                let form = Form::new()
                    .part("metadata", metadata_part)
                    .part("file", file_part);

                http.post(&url)
                    .query(&[
                        ("uploadType", "multipart"),
                        ("fields", "id,name,mimeType,webViewLink"),
                    ])
                    .multipart(form)
            })
            .await?;

        let file: DriveFile = Self::check(response, name).await?.json().await?;
        self.share_by_link(&file.id).await?;

        info!("Uploaded {} as {}", name, file.id);
        Ok(file)
    }

    /// Upload the content of a `data:` URL (signature pads produce these)
    pub async fn upload_data_url(
        &self,
        data_url: &str,
        name: &str,
        folder_id: Option<&str>,
    ) -> Result<DriveFile> {
        let (mime, bytes) = decode_data_url(data_url)?;
        self.upload(bytes, name, &mime, folder_id).await
    }

    /// Grant "anyone with the link" read access
    pub async fn share_by_link(&self, file_id: &str) -> Result<()> {
        let url = format!("{}/drive/v3/files/{}/permissions", self.base_url, file_id);
        let body = json!({ "role": "reader", "type": "anyone" });

        let response = self
            .client
            .send(|http| http.post(&url).json(&body))
            .await?;
        Self::check(response, file_id).await?;
        Ok(())
    }

    /// Find a folder by name (under `parent` when given), creating it when absent
    pub async fn find_or_create_folder(&self, name: &str, parent: Option<&str>) -> Result<String> {
        let cache_key = format!("{}/{}", parent.unwrap_or(""), name);
        if let Some(id) = self.folders.read().await.get(&cache_key) {
            return Ok(id.clone());
        }

        let mut query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            name.replace('\'', "\\'"),
            FOLDER_MIME_TYPE
        );
        if let Some(parent) = parent {
            query.push_str(&format!(" and '{}' in parents", parent));
        }

        let url = format!("{}/drive/v3/files", self.base_url);
        let response = self
            .client
            .send(|http| {
                http.get(&url).query(&[
                    ("q", query.as_str()),
                    ("fields", "files(id,name,mimeType)"),
                    ("spaces", "drive"),
                ])
            })
            .await?;
        let list: FileList = Self::check(response, name).await?.json().await?;

        let id = match list.files.into_iter().next() {
            Some(folder) => folder.id,
            None => {
                let mut body = json!({ "name": name, "mimeType": FOLDER_MIME_TYPE });
                if let Some(parent) = parent {
                    body["parents"] = json!([parent]);
                }
                let response = self
                    .client
                    .send(|http| {
                        http.post(&url)
                            .query(&[("fields", "id,name,mimeType")])
                            .json(&body)
                    })
                    .await?;
                let folder: DriveFile = Self::check(response, name).await?.json().await?;
                info!("Created folder {} ({})", name, folder.id);
                folder.id
            }
        };

        self.folders.write().await.insert(cache_key, id.clone());
        Ok(id)
    }

    /// Delete a file given its id or any Drive link to it
    pub async fn delete(&self, file_or_url: &str) -> Result<()> {
        let file_id = file_id_from_url(file_or_url)
            .ok_or_else(|| DriveError::FileNotFound(file_or_url.to_string()))?;
        let url = format!("{}/drive/v3/files/{}", self.base_url, file_id);

        let response = self.client.send(|http| http.delete(&url)).await?;
        Self::check(response, &file_id).await?;

        info!("Deleted file {}", file_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoshop_rust_auth::StaticToken;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(mock_server: &MockServer) -> DriveClient {
        let auth = AuthorizedClient::new(reqwest::Client::new(), Arc::new(StaticToken::new("fake-token")));
        DriveClient::with_base_url(&mock_server.uri(), auth)
    }

    #[test]
    fn test_file_id_from_url() {
        assert_eq!(
            file_id_from_url("https://drive.google.com/uc?export=view&id=abc123").as_deref(),
            Some("abc123")
        );
        assert_eq!(
            file_id_from_url("https://drive.google.com/file/d/xyz789/view?usp=sharing").as_deref(),
            Some("xyz789")
        );
        assert_eq!(file_id_from_url("plainId").as_deref(), Some("plainId"));
        assert_eq!(file_id_from_url("https://example.com/nothing"), None);
        assert_eq!(file_id_from_url(""), None);
    }

    #[test]
    fn test_decode_data_url() {
        let (mime, bytes) = decode_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"hello");

        assert!(matches!(
            decode_data_url("image/png;base64,aGVsbG8="),
            Err(DriveError::InvalidDataUrl(_))
        ));
        assert!(matches!(
            decode_data_url("data:text/plain,hello"),
            Err(DriveError::InvalidDataUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_shares_file() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/upload/drive/v3/files"))
            .and(query_param("uploadType", "multipart"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "file-1",
                "name": "front.jpg",
                "mimeType": "image/jpeg"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/drive/v3/files/file-1/permissions"))
            .and(body_json(json!({ "role": "reader", "type": "anyone" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "anyoneWithLink" })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let file = client(&mock_server)
            .upload(vec![1, 2, 3], "front.jpg", "image/jpeg", Some("folder-9"))
            .await
            .unwrap();
        assert_eq!(file.id, "file-1");
        assert_eq!(
            public_url(&file.id),
            "https://drive.google.com/uc?export=view&id=file-1"
        );
    }

    #[tokio::test]
    async fn test_upload_quota_exceeded() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/upload/drive/v3/files"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": { "code": 403, "message": "The user's Drive storage quota has been exceeded.",
                           "errors": [{ "reason": "storageQuotaExceeded" }] }
            })))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server)
            .upload(vec![0; 8], "big.jpg", "image/jpeg", None)
            .await
            .unwrap_err();
        assert!(err.is_quota_exceeded());
    }

    #[tokio::test]
    async fn test_find_or_create_folder_is_idempotent() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": [] })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/drive/v3/files"))
            .and(body_json(json!({ "name": "tasks", "mimeType": FOLDER_MIME_TYPE, "parents": ["root-folder"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "folder-77",
                "name": "tasks",
                "mimeType": FOLDER_MIME_TYPE
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let drive = client(&mock_server);
        let first = drive.find_or_create_folder("tasks", Some("root-folder")).await.unwrap();
        let second = drive.find_or_create_folder("tasks", Some("root-folder")).await.unwrap();
        assert_eq!(first, "folder-77");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_find_existing_folder() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "files": [{ "id": "existing", "name": "receptions", "mimeType": FOLDER_MIME_TYPE }]
            })))
            .mount(&mock_server)
            .await;

        let id = client(&mock_server)
            .find_or_create_folder("receptions", None)
            .await
            .unwrap();
        assert_eq!(id, "existing");
    }

    #[tokio::test]
    async fn test_delete_by_url() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/drive/v3/files/abc123"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/drive/v3/files/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let drive = client(&mock_server);
        drive
            .delete("https://drive.google.com/uc?export=view&id=abc123")
            .await
            .unwrap();

        match drive.delete("gone").await {
            Err(DriveError::FileNotFound(id)) => assert_eq!(id, "gone"),
            other => panic!("Expected FileNotFound, got {:?}", other),
        }
    }
}
