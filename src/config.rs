//! Configuration options for the autoshop client

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// How requests to Google are authorized
#[derive(Debug, Clone, PartialEq)]
pub enum Credentials {
    /// A bearer token obtained elsewhere (browser sign-in, gcloud, ...)
    AccessToken(String),

    /// An OAuth2 refresh token exchanged for access tokens on demand
    RefreshToken {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },

    /// A service account key file (JSON) signing its own assertions
    ServiceAccount(String),
}

/// Configuration options for the autoshop client
#[derive(Debug, Clone)]
pub struct ShopConfig {
    /// The spreadsheet holding every table
    pub spreadsheet_id: String,

    /// How requests are authorized
    pub credentials: Credentials,

    /// Drive folder receiving uploads; `None` uploads to the drive root
    pub drive_folder: Option<String>,

    /// Directory used by the file-backed local storage
    pub cache_dir: PathBuf,

    /// Queue writes made while offline instead of failing them
    pub offline_writes: bool,

    /// Timeout of the connectivity check
    pub ping_timeout: Duration,

    /// Timeout applied to every HTTP request, if any
    pub request_timeout: Option<Duration>,

    /// Overrides the Sheets API base URL
    pub sheets_base_url: Option<String>,

    /// Overrides the Drive API base URL
    pub drive_base_url: Option<String>,

    /// Overrides the OAuth token endpoint
    pub token_url: Option<String>,

    /// Base URL of the SMS web service
    pub sms_base_url: Option<String>,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            credentials: Credentials::AccessToken(String::new()),
            drive_folder: Some("autoshop".to_string()),
            cache_dir: PathBuf::from(".autoshop-cache"),
            offline_writes: false,
            ping_timeout: Duration::from_secs(5),
            request_timeout: None,
            sheets_base_url: None,
            drive_base_url: None,
            token_url: None,
            sms_base_url: None,
        }
    }
}

impl ShopConfig {
    pub fn new(spreadsheet_id: &str, credentials: Credentials) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.to_string(),
            credentials,
            ..Default::default()
        }
    }

    /// Build a configuration from environment variables.
    ///
    /// `AUTOSHOP_SPREADSHEET_ID` is required, plus one credential:
    /// `AUTOSHOP_ACCESS_TOKEN`, `AUTOSHOP_SERVICE_ACCOUNT_KEY` (path to the
    /// JSON key file) or the `AUTOSHOP_CLIENT_ID` / `AUTOSHOP_CLIENT_SECRET` /
    /// `AUTOSHOP_REFRESH_TOKEN` triple. `AUTOSHOP_CACHE_DIR`,
    /// `AUTOSHOP_DRIVE_FOLDER`, `AUTOSHOP_OFFLINE_WRITES` and
    /// `AUTOSHOP_SMS_BASE_URL` are optional.
    pub fn from_env() -> Result<Self> {
        let spreadsheet_id = std::env::var("AUTOSHOP_SPREADSHEET_ID").map_err(|_| {
            Error::config("AUTOSHOP_SPREADSHEET_ID environment variable not found")
        })?;

        let credentials = if let Ok(token) = std::env::var("AUTOSHOP_ACCESS_TOKEN") {
            Credentials::AccessToken(token)
        } else if let Ok(path) = std::env::var("AUTOSHOP_SERVICE_ACCOUNT_KEY") {
            let key = std::fs::read_to_string(&path).map_err(|e| {
                Error::config(format!("cannot read service account key {}: {}", path, e))
            })?;
            Credentials::ServiceAccount(key)
        } else {
            let var = |name: &str| {
                std::env::var(name)
                    .map_err(|_| Error::config(format!("{} environment variable not found", name)))
            };
            Credentials::RefreshToken {
                client_id: var("AUTOSHOP_CLIENT_ID")?,
                client_secret: var("AUTOSHOP_CLIENT_SECRET")?,
                refresh_token: var("AUTOSHOP_REFRESH_TOKEN")?,
            }
        };

        let mut config = Self::new(&spreadsheet_id, credentials);
        if let Ok(dir) = std::env::var("AUTOSHOP_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Ok(folder) = std::env::var("AUTOSHOP_DRIVE_FOLDER") {
            config.drive_folder = if folder.is_empty() { None } else { Some(folder) };
        }
        if let Ok(flag) = std::env::var("AUTOSHOP_OFFLINE_WRITES") {
            config.offline_writes = matches!(flag.as_str(), "1" | "true" | "TRUE" | "yes");
        }
        if let Ok(url) = std::env::var("AUTOSHOP_SMS_BASE_URL") {
            config.sms_base_url = Some(url);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot reach any spreadsheet
    pub fn validate(&self) -> Result<()> {
        if self.spreadsheet_id.trim().is_empty() {
            return Err(Error::config("spreadsheet_id cannot be empty"));
        }
        match &self.credentials {
            Credentials::AccessToken(token) if token.is_empty() => {
                Err(Error::config("access token cannot be empty"))
            }
            Credentials::RefreshToken { refresh_token, .. } if refresh_token.is_empty() => {
                Err(Error::config("refresh token cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Set the Drive folder receiving uploads
    pub fn with_drive_folder(mut self, value: Option<&str>) -> Self {
        self.drive_folder = value.map(|v| v.to_string());
        self
    }

    /// Set the local cache directory
    pub fn with_cache_dir(mut self, value: impl Into<PathBuf>) -> Self {
        self.cache_dir = value.into();
        self
    }

    /// Set whether offline writes are queued
    pub fn with_offline_writes(mut self, value: bool) -> Self {
        self.offline_writes = value;
        self
    }

    /// Set the connectivity check timeout
    pub fn with_ping_timeout(mut self, value: Duration) -> Self {
        self.ping_timeout = value;
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the Sheets API base URL
    pub fn with_sheets_base_url(mut self, value: &str) -> Self {
        self.sheets_base_url = Some(value.to_string());
        self
    }

    /// Set the Drive API base URL
    pub fn with_drive_base_url(mut self, value: &str) -> Self {
        self.drive_base_url = Some(value.to_string());
        self
    }

    /// Set the OAuth token endpoint
    pub fn with_token_url(mut self, value: &str) -> Self {
        self.token_url = Some(value.to_string());
        self
    }

    /// Set the SMS web service base URL
    pub fn with_sms_base_url(mut self, value: &str) -> Self {
        self.sms_base_url = Some(value.to_string());
        self
    }
}
