//! Report hook.
//!
//! Facade operations deliver every success through [`Reporter::report`] and
//! every failure through [`Reporter::error`], never both for one call.

use ab_protocol::{
	RunEvent, SpecImportOutcome, SpecMetadata, TestResult, TestRunIndexEntry, TestRunSummary, TesteeSummary,
};
use serde_json::Value;

use crate::error::Error;

/// A successful facade outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
	/// One entry of `list_test_runs`, in backend order.
	TestRun(TestRunSummary),
	/// A run was started; only the number of scheduled results is reported.
	RunStarted { run_id: String, result_count: usize },
	SpecImported(SpecImportOutcome),
	SpecByName { spec_id: String, body: Value },
	/// One entry of `list_specs`, before its detail is fetched.
	SpecListed { index: usize, metadata: SpecMetadata },
	/// A spec body, tagged with the caller-supplied index.
	Spec { index: usize, spec_id: String, body: Value },
	TestResult(TestResult),
	RunIndexEntry(TestRunIndexEntry),
	TesteeSummary(TesteeSummary),
	RunEvent(RunEvent),
}

/// Receives facade outcomes.
pub trait Reporter: Send + Sync {
	fn report(&self, report: Report);

	fn error(&self, operation: &'static str, error: &Error);
}

/// Writes reports as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
	fn report(&self, report: Report) {
		match report {
			Report::TestRun(run) => tracing::info!(run = %run.0, "Test run"),
			Report::RunStarted { run_id, result_count } => {
				tracing::info!(%run_id, result_count, "Test run started")
			}
			Report::SpecImported(outcome) => match outcome {
				SpecImportOutcome::Updated(id) => tracing::info!(spec_id = %id, "Spec updated"),
				SpecImportOutcome::Imported(id) => tracing::info!(spec_id = %id, "Spec imported"),
				SpecImportOutcome::Unchanged(id) => tracing::info!(spec_id = %id, "Spec unchanged"),
			},
			Report::SpecByName { spec_id, body } => tracing::info!(%spec_id, spec = %body, "Spec"),
			Report::SpecListed { index, metadata } => {
				tracing::info!(index, spec_id = %metadata.id, name = ?metadata.name, "Spec listed")
			}
			Report::Spec { index, spec_id, body } => tracing::info!(index, %spec_id, spec = %body, "Spec"),
			Report::TestResult(result) => tracing::info!(result = %result.0, "Test result"),
			Report::RunIndexEntry(entry) => {
				let failed = entry.results.values().filter(|r| !r.passed).count();
				tracing::info!(index = ?entry.index, testees = entry.results.len(), failed, "Run index entry")
			}
			Report::TesteeSummary(summary) => tracing::info!(
				testee = %summary.name,
				passed = summary.passed,
				failed = summary.failed,
				count = summary.count,
				"Testee summary"
			),
			Report::RunEvent(event) => match event {
				RunEvent::Result {
					testee,
					run_id,
					index,
					passed,
					remaining,
				} => tracing::info!(%run_id, %testee, ?index, passed, remaining, "Case finished"),
				RunEvent::Complete { testee, run_id } => tracing::info!(%run_id, %testee, "Testee complete"),
			},
		}
	}

	fn error(&self, operation: &'static str, error: &Error) {
		tracing::error!(operation, error = %error, "Operation failed");
	}
}
