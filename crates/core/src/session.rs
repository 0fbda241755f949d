//! Session handle - typed access to an established WAMP session.
//!
//! The handle wraps the runtime's [`Session`] and turns raw JSON results into
//! typed values, reporting shape mismatches as
//! [`Error::MalformedResult`](crate::Error::MalformedResult).

use std::fmt;
use std::sync::Arc;

use ab_runtime::Session;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Cloneable handle to the active session.
#[derive(Clone)]
pub struct SessionHandle {
	session: Arc<dyn Session>,
}

impl SessionHandle {
	pub fn new(session: Arc<dyn Session>) -> Self {
		Self { session }
	}

	/// Session id assigned by the router.
	pub fn session_id(&self) -> Option<String> {
		self.session.session_id()
	}

	/// Registers `name` as CURIE shorthand for `uri`.
	pub fn register_prefix(&self, name: &str, uri: &str) -> Result<()> {
		tracing::debug!(prefix = name, uri, "Registering prefix");
		self.session.prefix(name, uri).map_err(Into::into)
	}

	/// Calls a remote procedure and deserializes its result.
	pub async fn call<R: DeserializeOwned>(&self, procedure: &str, args: Vec<Value>) -> Result<R> {
		let value = self.call_value(procedure, args).await?;
		serde_json::from_value(value).map_err(|e| Error::malformed(procedure, e.to_string()))
	}

	/// Calls a remote procedure and returns its raw result.
	pub async fn call_value(&self, procedure: &str, args: Vec<Value>) -> Result<Value> {
		tracing::debug!(procedure, args = args.len(), "Remote call");
		self.session.call(procedure, args).await.map_err(Into::into)
	}

	/// Subscribes to a topic; the receiver ends with the session.
	pub fn subscribe(&self, topic: &str) -> Result<mpsc::UnboundedReceiver<Value>> {
		self.session.subscribe(topic).map_err(Into::into)
	}

	/// Releases `topic` once every receiver for it has been dropped.
	pub fn unsubscribe(&self, topic: &str) -> Result<()> {
		self.session.unsubscribe(topic).map_err(Into::into)
	}

	pub(crate) fn close(&self) {
		self.session.close();
	}
}

impl fmt::Debug for SessionHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionHandle")
			.field("session_id", &self.session.session_id())
			.finish()
	}
}
