//! Records returned by the `testdb` and `testrunner` procedures.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One historical test run as returned by `testdb:getTestRuns`.
///
/// The client forwards it untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestRunSummary(pub Value);

/// Lightweight spec record returned by `testdb:getSpecs`.
///
/// Only `id` is required; it drives the follow-up `testdb:getSpec` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecMetadata {
	pub id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub before_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub valid_from: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub valid_to: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub desc: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub mode: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub caseset: Option<String>,
}

/// Outcome of `testrunner:run`.
#[derive(Debug, Clone, PartialEq)]
pub struct TestRunStartResult {
	pub run_id: String,
	/// Result records the run populates, one per scheduled case.
	pub result_ids: Vec<Value>,
}

impl TestRunStartResult {
	pub fn result_count(&self) -> usize {
		self.result_ids.len()
	}
}

/// What `testdb:importSpec` did with the submitted spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecImportOutcome {
	/// An active spec with the same name existed and was replaced.
	Updated(String),
	/// No active spec with that name existed.
	Imported(String),
	/// The stored spec was identical.
	Unchanged(String),
}

impl SpecImportOutcome {
	/// Maps the backend's operation code onto an outcome.
	///
	/// Only the exact strings `"U"` and `"I"` are meaningful; anything else,
	/// including `null`, means the spec was left as it was.
	pub fn from_code(code: &Value, spec_id: String) -> Self {
		match code.as_str() {
			Some("U") => Self::Updated(spec_id),
			Some("I") => Self::Imported(spec_id),
			_ => Self::Unchanged(spec_id),
		}
	}

	pub fn spec_id(&self) -> &str {
		match self {
			Self::Updated(id) | Self::Imported(id) | Self::Unchanged(id) => id,
		}
	}
}

/// Per-testee outcome of a single case within a run index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseOutcome {
	pub id: String,
	#[serde(deserialize_with = "deserialize_flag")]
	pub passed: bool,
	/// Case duration in milliseconds, when recorded.
	#[serde(default)]
	pub duration: Option<f64>,
}

/// One case index of `testdb:getTestRunIndex`, with results keyed by testee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRunIndexEntry {
	pub index: Vec<u32>,
	pub results: BTreeMap<String, CaseOutcome>,
}

/// Pass/fail totals for one testee, from `testdb:getTestRunSummary`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TesteeSummary {
	pub name: String,
	pub passed: u64,
	pub failed: u64,
	pub count: u64,
}

/// Full record of one test case result from `testdb:getTestResult`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestResult(pub Value);

/// Progress events published by the test runner while a run executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunEvent {
	/// A single case finished for one testee.
	#[serde(rename_all = "camelCase")]
	Result {
		testee: String,
		run_id: String,
		index: Vec<u32>,
		passed: bool,
		remaining: u64,
	},
	/// All cases for one testee finished.
	#[serde(rename_all = "camelCase")]
	Complete { testee: String, run_id: String },
}

impl RunEvent {
	/// Topic suffix of per-case events.
	pub const ON_RESULT: &str = "onResult";
	/// Topic suffix of per-testee completion events.
	pub const ON_COMPLETE: &str = "onComplete";

	/// Decodes a payload published on `<base>onResult` or `<base>onComplete`.
	///
	/// Returns `None` for any other topic suffix.
	pub fn from_topic(suffix: &str, payload: Value) -> Option<serde_json::Result<Self>> {
		let variant = match suffix {
			Self::ON_RESULT => "result",
			Self::ON_COMPLETE => "complete",
			_ => return None,
		};
		let mut tagged = serde_json::Map::new();
		tagged.insert(variant.to_string(), payload);
		Some(serde_json::from_value(Value::Object(tagged)))
	}

	pub fn run_id(&self) -> &str {
		match self {
			RunEvent::Result { run_id, .. } | RunEvent::Complete { run_id, .. } => run_id,
		}
	}
}

/// Accepts `true`/`false` as well as the `0`/`1` integers the database stores.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
	D: serde::Deserializer<'de>,
{
	match Value::deserialize(deserializer)? {
		Value::Bool(b) => Ok(b),
		Value::Number(n) => Ok(n.as_f64().is_some_and(|n| n != 0.0)),
		other => Err(serde::de::Error::custom(format!("expected boolean flag, got {other}"))),
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn test_import_outcome_exact_codes() {
		let id = || "spec-1".to_string();
		assert_eq!(SpecImportOutcome::from_code(&json!("U"), id()), SpecImportOutcome::Updated(id()));
		assert_eq!(SpecImportOutcome::from_code(&json!("I"), id()), SpecImportOutcome::Imported(id()));
	}

	#[test]
	fn test_import_outcome_everything_else_is_unchanged() {
		for code in [json!(null), json!(""), json!("u"), json!("i"), json!("UI"), json!(" U"), json!(1), json!(["U"])] {
			let outcome = SpecImportOutcome::from_code(&code, "spec-1".to_string());
			assert_eq!(outcome, SpecImportOutcome::Unchanged("spec-1".to_string()), "code {code}");
		}
	}

	#[test]
	fn test_spec_metadata_only_requires_id() {
		let meta: SpecMetadata = serde_json::from_value(json!({"id": "A"})).unwrap();
		assert_eq!(meta.id, "A");
		assert!(meta.name.is_none());

		let meta: SpecMetadata = serde_json::from_value(json!({
			"id": "B",
			"beforeId": null,
			"validFrom": "2013-09-01T12:00:00Z",
			"validTo": null,
			"name": "Local WAMP Dual",
			"desc": null,
			"mode": "fuzzingwampclient",
			"caseset": "wamp",
			"extra": 1
		}))
		.unwrap();
		assert_eq!(meta.name.as_deref(), Some("Local WAMP Dual"));
		assert_eq!(meta.valid_from.as_deref(), Some("2013-09-01T12:00:00Z"));
	}

	#[test]
	fn test_run_index_entry() {
		let entry: TestRunIndexEntry = serde_json::from_value(json!({
			"index": [1, 2, 3, 0, 0],
			"results": {
				"AutobahnPython": {"id": "res-1", "passed": true, "duration": 12.5}
			}
		}))
		.unwrap();
		assert_eq!(entry.index, vec![1, 2, 3, 0, 0]);
		assert!(entry.results["AutobahnPython"].passed);
	}

	#[test]
	fn test_run_index_accepts_integer_flags() {
		let outcome: CaseOutcome = serde_json::from_value(json!({"id": "res-2", "passed": 0, "duration": 3})).unwrap();
		assert!(!outcome.passed);
		assert_eq!(outcome.duration, Some(3.0));
	}

	#[test]
	fn test_run_event_from_topic() {
		let event = RunEvent::from_topic(
			"onResult",
			json!({"testee": "AutobahnPython", "runId": "run-42", "index": [1, 1, 1], "passed": false, "remaining": 7}),
		)
		.unwrap()
		.unwrap();
		assert_eq!(event.run_id(), "run-42");
		assert!(matches!(event, RunEvent::Result { remaining: 7, passed: false, .. }));

		let event = RunEvent::from_topic("onComplete", json!({"testee": "AutobahnPython", "runId": "run-42"}))
			.unwrap()
			.unwrap();
		assert_eq!(
			event,
			RunEvent::Complete {
				testee: "AutobahnPython".to_string(),
				run_id: "run-42".to_string(),
			}
		);

		assert!(RunEvent::from_topic("onStart", json!({})).is_none());
	}
}
