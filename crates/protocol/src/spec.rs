//! Test specifications.
//!
//! A [`TestSpec`] names a case set, the cases to run from it, and the
//! testees (target implementations) to run them against. Specs are
//! imported into the test database whole via `testdb:importSpec` and
//! referenced by name afterwards.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;

/// Run modes the test runner accepts.
pub const SPEC_MODES: &[&str] = &["fuzzingwampclient"];

/// Case sets the test database knows about.
pub const SPEC_CASESETS: &[&str] = &["wamp"];

/// A test specification as accepted by `testdb:importSpec`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestSpec {
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub desc: Option<String>,
	/// Execution mode, e.g. `fuzzingwampclient`.
	pub mode: String,
	/// Case set the `cases` patterns select from, e.g. `wamp`.
	pub caseset: String,
	/// Case patterns to include (`"*"` for all).
	pub cases: Vec<String>,
	/// Case patterns to leave out.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub exclude: Option<Vec<String>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub options: Option<SpecOptions>,
	pub testees: Vec<Testee>,
}

/// Execution options applying to every testee of a spec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecOptions {
	/// Expected round-trip time in seconds, kept as written (`2` stays an integer).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rtt: Option<Number>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub randomize: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub parallel: Option<bool>,
}

/// A target implementation under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Testee {
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub desc: Option<String>,
	/// WebSocket URL the testee listens on.
	pub url: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub auth: Option<TesteeAuth>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub exclude: Option<Vec<String>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub options: Option<TesteeOptions>,
}

/// Per-testee overrides of [`SpecOptions`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TesteeOptions {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rtt: Option<Number>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub randomize: Option<bool>,
}

/// WAMP-CRA credentials used when the testee requires authentication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TesteeAuth {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub auth_key: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub auth_secret: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub auth_extra: Option<serde_json::Map<String, Value>>,
}

/// Reason a spec was refused before being sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SpecViolation(pub String);

impl TestSpec {
	/// Checks the constraints the test database enforces on import.
	///
	/// Structural checks (unknown attributes, wrong types, missing
	/// mandatory attributes) are already enforced by deserialization.
	pub fn validate(&self) -> Result<(), SpecViolation> {
		if self.name.trim().is_empty() {
			return Err(SpecViolation("test specification name must not be empty".into()));
		}
		if !SPEC_MODES.contains(&self.mode.as_str()) {
			return Err(SpecViolation(format!(
				"invalid mode '{}' in test specification",
				self.mode
			)));
		}
		if !SPEC_CASESETS.contains(&self.caseset.as_str()) {
			return Err(SpecViolation(format!(
				"invalid caseset '{}' in test specification",
				self.caseset
			)));
		}
		for (i, testee) in self.testees.iter().enumerate() {
			if testee.name.trim().is_empty() {
				return Err(SpecViolation(format!("testee #{i} has an empty name")));
			}
			if testee.url.trim().is_empty() {
				return Err(SpecViolation(format!(
					"testee '{}' has an empty url",
					testee.name
				)));
			}
		}
		Ok(())
	}
}
