//! RPC call facade.
//!
//! Each operation takes the current session from the [`ConnectionManager`],
//! issues exactly one remote call, and reports the outcome through the
//! [`Reporter`]. Without a session an operation fails with
//! [`Error::NotConnected`] before anything is sent.

use std::sync::Arc;

use ab_protocol::{
	RunEvent, SpecImportOutcome, SpecMetadata, TestResult, TestRunIndexEntry, TestRunStartResult, TestRunSummary,
	TestSpec, TesteeSummary,
};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::manager::ConnectionManager;
use crate::reporter::{LogReporter, Report, Reporter};
use crate::sequencer::{self, SpecFetch};
use crate::services::{TestDb, TestRunner};
use crate::session::SessionHandle;

/// Typed entry point to the test-suite backend.
#[derive(Clone)]
pub struct Client {
	manager: Arc<ConnectionManager>,
	reporter: Arc<dyn Reporter>,
}

impl Client {
	pub fn new(manager: Arc<ConnectionManager>, reporter: Arc<dyn Reporter>) -> Self {
		Self { manager, reporter }
	}

	/// Client reporting through [`LogReporter`].
	pub fn with_log_reporter(manager: Arc<ConnectionManager>) -> Self {
		Self::new(manager, Arc::new(LogReporter))
	}

	pub fn manager(&self) -> &Arc<ConnectionManager> {
		&self.manager
	}

	/// Lists the most recent test runs, newest first.
	///
	/// `limit` defaults to the configured run limit (5).
	pub async fn list_test_runs(&self, limit: Option<u32>) -> Result<Vec<TestRunSummary>> {
		const OP: &str = "list_test_runs";
		let limit = limit.unwrap_or(self.manager.config().run_limit);

		let session = self.session(OP)?;

		let result = TestDb::new(&session).get_test_runs(limit).await;
		self.finish(OP, result, |runs| {
			for run in runs {
				self.reporter.report(Report::TestRun(run.clone()));
			}
		})
	}

	/// Starts a run of `spec_name` (default "Local WAMP Dual").
	pub async fn start_test_run(&self, spec_name: Option<&str>) -> Result<TestRunStartResult> {
		self.run_spec("start_test_run", spec_name, None).await
	}

	/// Starts a run, telling the runner whether to persist results.
	pub async fn start_test_run_with(&self, spec_name: Option<&str>, save_results: bool) -> Result<TestRunStartResult> {
		self.run_spec("start_test_run_with", spec_name, Some(save_results)).await
	}

	async fn run_spec(
		&self,
		op: &'static str,
		spec_name: Option<&str>,
		save_results: Option<bool>,
	) -> Result<TestRunStartResult> {
		let spec_name = self.spec_name_or_default(spec_name);
		let session = self.session(op)?;

		let result = TestRunner::new(&session).run(&spec_name, save_results).await;
		self.finish(op, result, |started| {
			self.reporter.report(Report::RunStarted {
				run_id: started.run_id.clone(),
				result_count: started.result_count(),
			});
		})
	}

	/// Validates and imports a spec.
	///
	/// An invalid spec fails with [`Error::InvalidSpec`] without a remote call.
	pub async fn import_spec(&self, spec: &TestSpec) -> Result<SpecImportOutcome> {
		const OP: &str = "import_spec";
		let session = self.session(OP)?;

		if let Err(violation) = spec.validate() {
			let err = Error::from(violation);
			self.reporter.error(OP, &err);
			return Err(err);
		}

		let result = TestDb::new(&session).import_spec(spec).await;
		self.finish(OP, result, |outcome| {
			self.reporter.report(Report::SpecImported(outcome.clone()));
		})
	}

	/// Fetches the active spec called `spec_name`; empty or missing names
	/// fall back to the configured spec name.
	pub async fn get_spec_by_name(&self, spec_name: Option<&str>) -> Result<(String, Value)> {
		const OP: &str = "get_spec_by_name";
		let spec_name = self.spec_name_or_default(spec_name);
		let session = self.session(OP)?;

		let result = TestDb::new(&session).get_spec_by_name(&spec_name).await;
		self.finish(OP, result, |(spec_id, body)| {
			self.reporter.report(Report::SpecByName {
				spec_id: spec_id.clone(),
				body: body.clone(),
			});
		})
	}

	/// Fetches one spec body. `index` is passed through to the report untouched.
	pub async fn get_spec(&self, index: usize, spec_id: &str) -> Result<Value> {
		const OP: &str = "get_spec";
		let session = self.session(OP)?;

		let result = TestDb::new(&session).get_spec(spec_id).await;
		self.finish(OP, result, |body| {
			self.reporter.report(Report::Spec {
				index,
				spec_id: spec_id.to_string(),
				body: body.clone(),
			});
		})
	}

	/// Lists spec metadata, then fetches every spec body concurrently.
	///
	/// `active_only` defaults to the configured value (true). The returned
	/// fetches are ordered by their position in the metadata list; a failed
	/// detail fetch is reported on its own and does not fail the listing.
	pub async fn list_specs(&self, active_only: Option<bool>) -> Result<Vec<SpecFetch>> {
		const OP: &str = "list_specs";
		let active_only = active_only.unwrap_or(self.manager.config().active_only);
		let session = self.session(OP)?;

		let result = TestDb::new(&session).get_specs(active_only).await;
		let specs: Vec<SpecMetadata> = self.finish(OP, result, |specs| {
			for (index, metadata) in specs.iter().enumerate() {
				self.reporter.report(Report::SpecListed {
					index,
					metadata: metadata.clone(),
				});
			}
		})?;

		Ok(sequencer::fetch_specs(self, &specs).await)
	}

	pub async fn get_test_result(&self, result_id: &str) -> Result<TestResult> {
		const OP: &str = "get_test_result";
		let session = self.session(OP)?;

		let result = TestDb::new(&session).get_test_result(result_id).await;
		self.finish(OP, result, |result| {
			self.reporter.report(Report::TestResult(result.clone()));
		})
	}

	pub async fn get_test_run_index(&self, run_id: &str) -> Result<Vec<TestRunIndexEntry>> {
		const OP: &str = "get_test_run_index";
		let session = self.session(OP)?;

		let result = TestDb::new(&session).get_test_run_index(run_id).await;
		self.finish(OP, result, |entries| {
			for entry in entries {
				self.reporter.report(Report::RunIndexEntry(entry.clone()));
			}
		})
	}

	pub async fn get_test_run_summary(&self, run_id: &str) -> Result<Vec<TesteeSummary>> {
		const OP: &str = "get_test_run_summary";
		let session = self.session(OP)?;

		let result = TestDb::new(&session).get_test_run_summary(run_id).await;
		self.finish(OP, result, |summaries| {
			for summary in summaries {
				self.reporter.report(Report::TesteeSummary(summary.clone()));
			}
		})
	}

	/// Subscribes to run progress events.
	///
	/// With `run_id`, events of other runs are dropped. Each delivered event
	/// is also reported. The receiver ends when the session does.
	pub fn watch_runs(&self, run_id: Option<&str>) -> Result<mpsc::UnboundedReceiver<RunEvent>> {
		const OP: &str = "watch_runs";
		let session = self.session(OP)?;
		let config = self.manager.config();

		let result_topic = config.event_topic(RunEvent::ON_RESULT);
		let subscribed = session.subscribe(&result_topic).and_then(|results| {
			match session.subscribe(&config.event_topic(RunEvent::ON_COMPLETE)) {
				Ok(completions) => Ok((results, completions)),
				Err(e) => {
					drop(results);
					if let Err(release) = session.unsubscribe(&result_topic) {
						tracing::debug!(error = %release, "Could not release result topic");
					}
					Err(e)
				}
			}
		});
		let (mut results, mut completions) = match subscribed {
			Ok(receivers) => receivers,
			Err(e) => {
				self.reporter.error(OP, &e);
				return Err(e);
			}
		};

		let (tx, rx) = mpsc::unbounded_channel();
		let reporter = Arc::clone(&self.reporter);
		let run_id = run_id.map(str::to_string);

		tokio::spawn(async move {
			loop {
				let (suffix, payload) = tokio::select! {
					Some(payload) = results.recv() => (RunEvent::ON_RESULT, payload),
					Some(payload) = completions.recv() => (RunEvent::ON_COMPLETE, payload),
					else => break,
				};

				let event = match RunEvent::from_topic(suffix, payload) {
					Some(Ok(event)) => event,
					Some(Err(e)) => {
						reporter.error(OP, &Error::malformed(suffix, e.to_string()));
						continue;
					}
					None => continue,
				};

				if run_id.as_deref().is_some_and(|id| id != event.run_id()) {
					continue;
				}

				reporter.report(Report::RunEvent(event.clone()));
				if tx.send(event).is_err() {
					break;
				}
			}
			tracing::debug!("Run event watch ended");
		});

		Ok(rx)
	}

	fn spec_name_or_default(&self, spec_name: Option<&str>) -> String {
		match spec_name {
			Some(name) if !name.is_empty() => name.to_string(),
			_ => self.manager.config().spec_name.clone(),
		}
	}

	/// Current session, or [`Error::NotConnected`] routed to the reporter.
	fn session(&self, op: &'static str) -> Result<SessionHandle> {
		self.manager.require().inspect_err(|e| self.reporter.error(op, e))
	}

	/// Routes a call outcome to exactly one reporter channel.
	fn finish<T>(&self, op: &'static str, result: Result<T>, on_success: impl FnOnce(&T)) -> Result<T> {
		match &result {
			Ok(value) => on_success(value),
			Err(e) => self.reporter.error(op, e),
		}
		result
	}
}
