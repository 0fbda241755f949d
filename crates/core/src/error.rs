//! Error types for the test-suite client.

use ab_protocol::SpecViolation;
use ab_runtime::{CloseCode, CloseInfo};
use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the connection manager and facade operations.
#[derive(Debug, Error)]
pub enum Error {
	/// No session is active. The operation issued no remote call.
	#[error("Not connected: start a session before calling the backend")]
	NotConnected,

	/// The connection attempt failed or an established connection ended.
	#[error("Connection {code}: {reason}{}", detail.as_ref().map(|d| format!(" ({d})")).unwrap_or_default())]
	ConnectionLost {
		code: CloseCode,
		reason: String,
		detail: Option<String>,
	},

	/// The remote call was rejected. Forwarded as the runtime reported it.
	#[error(transparent)]
	RemoteCall(#[from] ab_runtime::Error),

	/// The backend answered with a value of the wrong shape.
	#[error("Malformed result from {procedure}: {reason}")]
	MalformedResult { procedure: String, reason: String },

	/// The spec failed client-side validation and was not sent.
	#[error("Invalid spec: {0}")]
	InvalidSpec(#[from] SpecViolation),

	/// The configuration file could not be read or parsed.
	#[error("Configuration error: {0}")]
	Config(String),
}

impl From<CloseInfo> for Error {
	fn from(info: CloseInfo) -> Self {
		Error::ConnectionLost {
			code: info.code,
			reason: info.reason,
			detail: info.detail,
		}
	}
}

impl Error {
	pub(crate) fn malformed(procedure: &str, reason: impl Into<String>) -> Self {
		Error::MalformedResult {
			procedure: procedure.to_string(),
			reason: reason.into(),
		}
	}

	/// Returns true if the operation failed because no session was active.
	pub fn is_not_connected(&self) -> bool {
		matches!(self, Error::NotConnected)
	}

	/// Returns the backend's error URI if the remote call was rejected.
	pub fn remote_uri(&self) -> Option<&str> {
		match self {
			Error::RemoteCall(err) => err.error_uri(),
			_ => None,
		}
	}
}
