use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access event file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("event data is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("remote store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("remote store returned {status}: {body}")]
    Remote { status: u16, body: String },
    #[error("remote store authentication failed: {0}")]
    Auth(String),
    #[error("store is not configured: {0}")]
    NotConfigured(String),
    #[error("{0} store does not support saving events")]
    ReadOnly(&'static str),
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("sender email or password is not configured")]
    MissingCredentials,
    #[error("no recipients configured")]
    NoRecipients,
    #[error("invalid address `{address}`: {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },
    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp transport failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}
