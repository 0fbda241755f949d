//! Error types for the WAMP runtime.

use ab_protocol::DecodeError;
use serde_json::Value;
use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the WAMP runtime.
#[derive(Debug, Error)]
pub enum Error {
	/// Failed to establish a connection with the router.
	#[error("Failed to connect to WAMP router: {0}")]
	ConnectionFailed(String),

	/// The server did not agree to speak the `wamp` subprotocol.
	#[error("Server does not support WAMP v1: {0}")]
	Unsupported(String),

	/// Transport-level error (WebSocket I/O).
	#[error("Transport error: {0}")]
	TransportError(String),

	/// Protocol-level error (WAMP framing or correlation).
	#[error("Protocol error: {0}")]
	ProtocolError(String),

	/// The remote procedure answered with `CALLERROR`.
	#[error("{uri}: {description}")]
	Remote {
		/// Error URI identifying the error class
		uri: String,
		/// Human-readable error description
		description: String,
		/// Application-specific error details, if the server sent any
		details: Option<Value>,
	},

	/// Timeout waiting for the session handshake.
	#[error("Timeout: {0}")]
	Timeout(String),

	/// Connection closed before the call could complete.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl From<DecodeError> for Error {
	fn from(err: DecodeError) -> Self {
		Error::ProtocolError(err.to_string())
	}
}

impl Error {
	/// Returns the error URI if this is a Remote error.
	pub fn error_uri(&self) -> Option<&str> {
		match self {
			Error::Remote { uri, .. } => Some(uri),
			_ => None,
		}
	}

	/// Returns true if the call failed because the connection went away.
	pub fn is_closed(&self) -> bool {
		matches!(self, Error::ChannelClosed)
	}
}
