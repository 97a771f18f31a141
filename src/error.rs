//! Error type shared by the store, codecs and transport.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
  /// A mutating operation was attempted without a write token.
  #[error("Authentication required for write operations")]
  AuthRequired,

  #[error("No object found with ID: {id}")]
  NotFound { id: String },

  /// A cached issue number points at an issue that does not carry the
  /// object's identity labels. Recovered inside the store.
  #[error("Issue #{issue_number} does not match object {id}")]
  IdentityMismatch { id: String, issue_number: u64 },

  /// The tracker answered with a non-2xx status.
  #[error("GitHub API error ({status}): {message}")]
  Transport { status: u16, message: String },

  #[error("Failed to decode payload: {0}")]
  Decode(#[from] serde_json::Error),

  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Invalid configuration: {0}")]
  InvalidConfig(String),
}

impl StoreError {
  pub fn not_found(id: impl Into<String>) -> Self {
    Self::NotFound { id: id.into() }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::NotFound { .. })
  }

  /// HTTP status carried by a transport failure, if any.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Transport { status, .. } => Some(*status),
      Self::Http(e) => e.status().map(|s| s.as_u16()),
      _ => None,
    }
  }
}
