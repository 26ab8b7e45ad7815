//! Error handling for the autoshop client

use std::fmt;
use thiserror::Error;

use autoshop_rust_auth::AuthError;
use autoshop_rust_drive::DriveError;
use autoshop_rust_sheets::SheetsError;
use autoshop_rust_sms::SmsError;

use crate::models::Status;

/// Unified error type
#[derive(Error, Debug)]
pub enum Error {
    /// Spreadsheet API errors
    #[error("Sheets error: {0}")]
    Sheets(#[from] SheetsError),

    /// File storage errors
    #[error("Drive error: {0}")]
    Drive(#[from] DriveError),

    /// Credential errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// SMS gateway errors
    #[error("SMS error: {0}")]
    Sms(#[from] SmsError),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local storage errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote store could not be reached
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    /// A row could not be turned into an entity
    #[error("Invalid row {row} in {table}: {message}")]
    Decode {
        table: &'static str,
        row: usize,
        message: String,
    },

    /// Input rejected before any remote call
    #[error("Validation error: {0}")]
    Validation(String),

    /// A unique login key is already taken
    #[error("Duplicate {field}: {value}")]
    Duplicate { field: &'static str, value: String },

    /// Status writes only move forward
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: Status, to: Status },

    /// Login key or code did not match
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The account exists but may not sign in
    #[error("Account disabled: {0}")]
    AccountDisabled(String),

    /// SMS settings are switched off
    #[error("SMS sending is disabled")]
    SmsDisabled,

    /// A referenced record that is not a store row (template, settings, ...)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new validation error
    pub fn validation<T: fmt::Display>(msg: T) -> Self {
        Error::Validation(msg.to_string())
    }

    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// Transport failures: the remote never answered
    pub fn is_network(&self) -> bool {
        match self {
            Error::Unavailable(_) => true,
            Error::Sheets(e) => e.is_network(),
            Error::Drive(e) => e.is_network(),
            Error::Auth(AuthError::NetworkError(_)) => true,
            Error::Sms(SmsError::NetworkError(_)) => true,
            _ => false,
        }
    }

    /// The credential was rejected even after a refresh; the user must sign in again
    pub fn is_auth(&self) -> bool {
        match self {
            Error::Auth(AuthError::ReauthenticationRequired(_)) => true,
            Error::Sheets(e) => e.is_reauthentication_required(),
            Error::Drive(DriveError::AuthError(AuthError::ReauthenticationRequired(_))) => true,
            _ => false,
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
