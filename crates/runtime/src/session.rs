//! The session contract consumed by higher layers.
//!
//! [`Session`] is everything a caller needs from an established WAMP session:
//! prefix registration, remote calls, and topic subscription. [`Connector`]
//! produces sessions. Both are object-safe so callers can substitute scripted
//! implementations in tests.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;

/// Boxed future resolving with a remote call's return value.
pub type CallFuture<'a> = Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>>;

/// Future that resolves once when an established session goes away.
pub type ClosedSignal = Pin<Box<dyn Future<Output = CloseInfo> + Send>>;

/// Boxed connect future.
pub type ConnectFuture<'a> =
	Pin<Box<dyn Future<Output = std::result::Result<Established, CloseInfo>> + Send + 'a>>;

/// Why a connection attempt failed or an established connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
	/// Closed cleanly, by either side.
	Closed,
	/// The connection dropped.
	Lost,
	/// The endpoint could not be reached.
	Unreachable,
	/// The endpoint does not speak WAMP v1.
	Unsupported,
}

impl fmt::Display for CloseCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			CloseCode::Closed => "closed",
			CloseCode::Lost => "lost",
			CloseCode::Unreachable => "unreachable",
			CloseCode::Unsupported => "unsupported",
		};
		f.write_str(s)
	}
}

/// The `(code, reason, detail)` triple reported on failure or loss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
	pub code: CloseCode,
	pub reason: String,
	pub detail: Option<String>,
}

impl CloseInfo {
	pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
		Self {
			code,
			reason: reason.into(),
			detail: None,
		}
	}

	pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
		self.detail = Some(detail.into());
		self
	}
}

impl fmt::Display for CloseInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "connection {}: {}", self.code, self.reason)?;
		if let Some(detail) = &self.detail {
			write!(f, " ({detail})")?;
		}
		Ok(())
	}
}

/// An established WAMP session.
pub trait Session: Send + Sync {
	/// Session id assigned by the router in `WELCOME`.
	fn session_id(&self) -> Option<String>;

	/// Registers `prefix` as shorthand for `uri`. Re-registering a prefix
	/// replaces its URI.
	fn prefix(&self, prefix: &str, uri: &str) -> Result<()>;

	/// Calls a remote procedure by full URI or CURIE (`prefix:suffix`).
	fn call(&self, procedure: &str, args: Vec<Value>) -> CallFuture<'_>;

	/// Subscribes to a topic by full URI or CURIE.
	///
	/// The receiver yields event payloads until the session ends.
	fn subscribe(&self, topic: &str) -> Result<mpsc::UnboundedReceiver<Value>>;

	/// Releases a topic whose receivers were all dropped, without waiting for
	/// its next event.
	fn unsubscribe(&self, topic: &str) -> Result<()>;

	/// Starts closing the session. The closed signal fires once done.
	fn close(&self);
}

/// A session together with the signal of its end.
pub struct Established {
	pub session: Arc<dyn Session>,
	pub closed: ClosedSignal,
}

/// Opens sessions to an endpoint.
///
/// Exactly one outcome per attempt: an [`Established`] session, or the
/// [`CloseInfo`] describing why the attempt failed.
pub trait Connector: Send + Sync {
	fn connect<'a>(&'a self, endpoint: &'a str) -> ConnectFuture<'a>;
}
