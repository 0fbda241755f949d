use std::collections::HashSet;

use autobahn_client::{Client, CloseCode, CloseInfo, RunEvent};
use tokio::sync::mpsc;

use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use crate::output::{self, OutputFormat, RunData};

/// Tracks a watched run until every scheduled result and every completion arrived.
#[derive(Debug, Default)]
pub struct RunProgress {
	expected: usize,
	results: usize,
	testees: HashSet<String>,
	completed: HashSet<String>,
}

impl RunProgress {
	pub fn new(expected: usize) -> Self {
		Self {
			expected,
			..Self::default()
		}
	}

	pub fn record(&mut self, event: &RunEvent) {
		match event {
			RunEvent::Result { testee, .. } => {
				self.results += 1;
				self.testees.insert(testee.clone());
			}
			RunEvent::Complete { testee, .. } => {
				self.testees.insert(testee.clone());
				self.completed.insert(testee.clone());
			}
		}
	}

	pub fn is_finished(&self) -> bool {
		self.results >= self.expected && self.testees.iter().all(|t| self.completed.contains(t))
	}
}

pub(super) async fn run(client: &Client, args: &RunArgs, format: OutputFormat) -> Result<RunData> {
	// Subscribe first so no early event is missed.
	let events = if args.watch { Some(client.watch_runs(None)?) } else { None };

	let started = if args.no_save {
		client.start_test_run_with(args.spec.as_deref(), false).await?
	} else {
		client.start_test_run(args.spec.as_deref()).await?
	};

	let mut data = RunData::started(&started);
	if let Some(events) = events {
		tracing::info!(run_id = %data.run_id, expected = data.result_count, "Following test run");
		data.events = Some(follow(events, &data.run_id, data.result_count, format).await?);
	}
	Ok(data)
}

async fn follow(
	mut events: mpsc::UnboundedReceiver<RunEvent>,
	run_id: &str,
	expected: usize,
	format: OutputFormat,
) -> Result<Vec<RunEvent>> {
	let mut progress = RunProgress::new(expected);
	let mut seen = Vec::new();

	let interrupt = tokio::signal::ctrl_c();
	tokio::pin!(interrupt);

	while !progress.is_finished() {
		tokio::select! {
			event = events.recv() => {
				let Some(event) = event else {
					return Err(session_ended());
				};
				if event.run_id() != run_id {
					continue;
				}
				if format == OutputFormat::Text {
					eprintln!("{}", output::event_line(&event));
				}
				progress.record(&event);
				seen.push(event);
			}
			_ = &mut interrupt => return Err(CliError::Interrupted),
		}
	}

	Ok(seen)
}

/// Streams events until interrupted; returns how many were printed.
pub(super) async fn watch(client: &Client, run_id: Option<&str>, format: OutputFormat) -> Result<usize> {
	let mut events = client.watch_runs(run_id)?;
	let mut count = 0;

	let interrupt = tokio::signal::ctrl_c();
	tokio::pin!(interrupt);

	loop {
		tokio::select! {
			event = events.recv() => {
				let Some(event) = event else {
					return Err(session_ended());
				};
				output::print_event(&event, format);
				count += 1;
			}
			_ = &mut interrupt => break,
		}
	}

	Ok(count)
}

fn session_ended() -> CliError {
	autobahn_client::Error::from(CloseInfo::new(CloseCode::Lost, "session ended while watching")).into()
}
