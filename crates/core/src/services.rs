//! Typed interfaces of the `testdb` and `testrunner` backend services.
//!
//! Procedures are addressed as CURIEs (`testdb:getSpec`); the connection
//! manager registers both prefixes when a session becomes ready.

use ab_protocol::{
	SpecImportOutcome, SpecMetadata, TestResult, TestRunIndexEntry, TestRunStartResult, TestRunSummary, TestSpec,
	TesteeSummary,
};
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::session::SessionHandle;

/// The test database: specs, runs, and results.
pub struct TestDb<'a> {
	session: &'a SessionHandle,
}

impl<'a> TestDb<'a> {
	pub const PREFIX: &'static str = "testdb";

	pub const IMPORT_SPEC: &'static str = "testdb:importSpec";
	pub const GET_SPECS: &'static str = "testdb:getSpecs";
	pub const GET_SPEC: &'static str = "testdb:getSpec";
	pub const GET_SPEC_BY_NAME: &'static str = "testdb:getSpecByName";
	pub const GET_TEST_RUNS: &'static str = "testdb:getTestRuns";
	pub const GET_TEST_RESULT: &'static str = "testdb:getTestResult";
	pub const GET_TEST_RUN_INDEX: &'static str = "testdb:getTestRunIndex";
	pub const GET_TEST_RUN_SUMMARY: &'static str = "testdb:getTestRunSummary";

	pub fn new(session: &'a SessionHandle) -> Self {
		Self { session }
	}

	/// Imports a spec. The backend answers `[op, spec_id, name]`.
	pub async fn import_spec(&self, spec: &TestSpec) -> Result<SpecImportOutcome> {
		let procedure = Self::IMPORT_SPEC;
		let spec = serde_json::to_value(spec).map_err(ab_runtime::Error::from)?;
		let value = self.session.call_value(procedure, vec![spec]).await?;

		let items = tuple(procedure, value, 2)?;
		let spec_id = string_at(procedure, &items, 1, "spec id")?;
		Ok(SpecImportOutcome::from_code(&items[0], spec_id))
	}

	pub async fn get_specs(&self, active_only: bool) -> Result<Vec<SpecMetadata>> {
		self.session.call(Self::GET_SPECS, vec![json!(active_only)]).await
	}

	pub async fn get_spec(&self, spec_id: &str) -> Result<Value> {
		self.session.call_value(Self::GET_SPEC, vec![json!(spec_id)]).await
	}

	/// Fetches the active spec called `name`. The backend answers `[spec_id, body]`.
	pub async fn get_spec_by_name(&self, name: &str) -> Result<(String, Value)> {
		let procedure = Self::GET_SPEC_BY_NAME;
		let value = self.session.call_value(procedure, vec![json!(name)]).await?;

		let mut items = tuple(procedure, value, 2)?;
		let spec_id = string_at(procedure, &items, 0, "spec id")?;
		Ok((spec_id, items.swap_remove(1)))
	}

	pub async fn get_test_runs(&self, limit: u32) -> Result<Vec<TestRunSummary>> {
		self.session.call(Self::GET_TEST_RUNS, vec![json!(limit)]).await
	}

	pub async fn get_test_result(&self, result_id: &str) -> Result<TestResult> {
		self.session.call(Self::GET_TEST_RESULT, vec![json!(result_id)]).await
	}

	pub async fn get_test_run_index(&self, run_id: &str) -> Result<Vec<TestRunIndexEntry>> {
		self.session.call(Self::GET_TEST_RUN_INDEX, vec![json!(run_id)]).await
	}

	pub async fn get_test_run_summary(&self, run_id: &str) -> Result<Vec<TesteeSummary>> {
		self.session.call(Self::GET_TEST_RUN_SUMMARY, vec![json!(run_id)]).await
	}
}

/// The test runner: executes specs against their testees.
pub struct TestRunner<'a> {
	session: &'a SessionHandle,
}

impl<'a> TestRunner<'a> {
	pub const PREFIX: &'static str = "testrunner";

	pub const RUN: &'static str = "testrunner:run";

	pub fn new(session: &'a SessionHandle) -> Self {
		Self { session }
	}

	/// Starts a run of the named spec. The backend answers `[run_id, result_ids]`.
	///
	/// `save_results` is only sent when given; the backend saves by default.
	pub async fn run(&self, spec_name: &str, save_results: Option<bool>) -> Result<TestRunStartResult> {
		let procedure = Self::RUN;
		let mut args = vec![json!(spec_name)];
		if let Some(save) = save_results {
			args.push(json!(save));
		}
		let value = self.session.call_value(procedure, args).await?;

		let mut items = tuple(procedure, value, 2)?;
		let run_id = string_at(procedure, &items, 0, "run id")?;
		let result_ids = match items.swap_remove(1) {
			Value::Array(ids) => ids,
			other => return Err(Error::malformed(procedure, format!("expected result id list, got {other}"))),
		};
		Ok(TestRunStartResult { run_id, result_ids })
	}
}

/// Unpacks an array result with at least `min_len` elements. Extra elements
/// are kept but never required.
fn tuple(procedure: &str, value: Value, min_len: usize) -> Result<Vec<Value>> {
	match value {
		Value::Array(items) if items.len() >= min_len => Ok(items),
		Value::Array(items) => Err(Error::malformed(
			procedure,
			format!("expected at least {min_len} elements, got {}", items.len()),
		)),
		other => Err(Error::malformed(procedure, format!("expected an array, got {other}"))),
	}
}

fn string_at(procedure: &str, items: &[Value], index: usize, what: &str) -> Result<String> {
	match &items[index] {
		Value::String(s) => Ok(s.clone()),
		Value::Number(n) => Ok(n.to_string()),
		other => Err(Error::malformed(procedure, format!("expected {what} at position {index}, got {other}"))),
	}
}
