//! Client configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```json
//! { "endpoint": "ws://192.168.1.10:8090/ws", "runLimit": 20 }
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8090/ws";
pub const DEFAULT_TESTDB_URI: &str = "http://api.testsuite.autobahn.ws/testdb/";
pub const DEFAULT_TESTRUNNER_URI: &str = "http://api.testsuite.autobahn.ws/testrunner/";
pub const DEFAULT_EVENT_TOPIC_BASE: &str = "http://api.testsuite.wamp.ws/testrun#";
pub const DEFAULT_SPEC_NAME: &str = "Local WAMP Dual";
pub const DEFAULT_RUN_LIMIT: u32 = 5;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Endpoint, namespace URIs, and facade defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
	/// WebSocket URL of the WAMP router.
	pub endpoint: String,
	/// Base URI registered for the `testdb` prefix.
	pub testdb_uri: String,
	/// Base URI registered for the `testrunner` prefix.
	pub testrunner_uri: String,
	/// Topic URI prefix of test run progress events.
	pub event_topic_base: String,
	/// Bound on the WebSocket handshake plus `WELCOME`.
	pub connect_timeout_ms: u64,
	/// Default `limit` of `list_test_runs`.
	pub run_limit: u32,
	/// Default spec name of `start_test_run` and `get_spec_by_name`.
	pub spec_name: String,
	/// Default `active_only` of `list_specs`.
	pub active_only: bool,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			endpoint: DEFAULT_ENDPOINT.to_string(),
			testdb_uri: DEFAULT_TESTDB_URI.to_string(),
			testrunner_uri: DEFAULT_TESTRUNNER_URI.to_string(),
			event_topic_base: DEFAULT_EVENT_TOPIC_BASE.to_string(),
			connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
			run_limit: DEFAULT_RUN_LIMIT,
			spec_name: DEFAULT_SPEC_NAME.to_string(),
			active_only: true,
		}
	}
}

impl ClientConfig {
	/// Reads a JSON config file.
	pub fn load(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)
			.map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
		let config: Self = serde_json::from_str(&content)
			.map_err(|e| Error::Config(format!("invalid config {}: {e}", path.display())))?;
		tracing::debug!(path = %path.display(), endpoint = %config.endpoint, "Loaded client config");
		Ok(config)
	}

	/// Reads `path` if given, otherwise returns the defaults.
	pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
		match path {
			Some(path) => Self::load(path),
			None => Ok(Self::default()),
		}
	}

	pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.endpoint = endpoint.into();
		self
	}

	pub fn connect_timeout(&self) -> Duration {
		Duration::from_millis(self.connect_timeout_ms)
	}

	/// Full URI of a run progress topic, e.g. `onResult`.
	pub fn event_topic(&self, suffix: &str) -> String {
		format!("{}{suffix}", self.event_topic_base)
	}
}
