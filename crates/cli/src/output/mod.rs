//! Result envelope printed by every command.
//!
//! ## Output Contract
//!
//! ```json
//! {
//!   "ok": true,
//!   "command": "run",
//!   "data": { "runId": "run-42", "resultCount": 3 },
//!   "timings": { "durationMs": 412 }
//! }
//! ```
//!
//! On failure `data` is replaced by
//! `"error": { "code": "REMOTE_ERROR", "message": "...", "details": { "uri": "..." } }`.


use std::io::{self, Write};
use std::time::Instant;

use autobahn_client::{RunEvent, SpecImportOutcome, TestRunStartResult};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Output format for command results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// Pretty-printed JSON envelope
	#[default]
	Json,
	/// One compact JSON document per line
	Ndjson,
	/// Human-readable text
	Text,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	pub ok: bool,

	/// Subcommand name, e.g. "run-index"
	pub command: String,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub timings: Option<Timings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// No session could be opened, or it ended mid-command
	ConnectionFailed,
	/// The backend answered with CALLERROR
	RemoteError,
	/// The backend answered with an unexpected shape
	MalformedResult,
	/// The spec failed local validation
	InvalidSpec,
	/// The config file could not be read or parsed
	ConfigError,
	IoError,
	InvalidInput,
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let code = match self {
			ErrorCode::ConnectionFailed => "CONNECTION_FAILED",
			ErrorCode::RemoteError => "REMOTE_ERROR",
			ErrorCode::MalformedResult => "MALFORMED_RESULT",
			ErrorCode::InvalidSpec => "INVALID_SPEC",
			ErrorCode::ConfigError => "CONFIG_ERROR",
			ErrorCode::IoError => "IO_ERROR",
			ErrorCode::InvalidInput => "INVALID_INPUT",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		};
		f.write_str(code)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
	pub duration_ms: u64,
}

pub struct ResultBuilder<T: Serialize> {
	command: String,
	started: Instant,
	data: Option<T>,
	error: Option<CommandError>,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			started: Instant::now(),
			data: None,
			error: None,
		}
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn failure(mut self, error: CommandError) -> Self {
		self.error = Some(error);
		self
	}

	pub fn build(self) -> CommandResult<T> {
		let ok = self.error.is_none();
		CommandResult {
			ok,
			command: self.command,
			data: if ok { self.data } else { None },
			error: self.error,
			timings: Some(Timings {
				duration_ms: self.started.elapsed().as_millis() as u64,
			}),
		}
	}
}

pub type EmptyResult = CommandResult<()>;

/// Data of `run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunData {
	pub run_id: String,
	pub result_count: usize,
	/// Progress events of this run, present with `--watch`
	#[serde(skip_serializing_if = "Option::is_none")]
	pub events: Option<Vec<RunEvent>>,
}

impl RunData {
	pub fn started(result: &TestRunStartResult) -> Self {
		Self {
			run_id: result.run_id.clone(),
			result_count: result.result_count(),
			events: None,
		}
	}
}

/// Data of `import`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportData {
	/// "updated", "imported" or "unchanged"
	pub outcome: String,
	pub spec_id: String,
}

impl From<&SpecImportOutcome> for ImportData {
	fn from(outcome: &SpecImportOutcome) -> Self {
		let label = match outcome {
			SpecImportOutcome::Updated(_) => "updated",
			SpecImportOutcome::Imported(_) => "imported",
			SpecImportOutcome::Unchanged(_) => "unchanged",
		};
		Self {
			outcome: label.to_string(),
			spec_id: outcome.spec_id().to_string(),
		}
	}
}

/// Data of `spec` and `spec-by-name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecData {
	pub spec_id: String,
	pub spec: Value,
}

/// One entry of `specs`; exactly one of `spec` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecEntry {
	pub index: usize,
	pub spec_id: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub spec: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	match format {
		OutputFormat::Json => {
			if let Ok(json) = serde_json::to_string_pretty(result) {
				println!("{json}");
			}
		}
		OutputFormat::Ndjson => {
			if let Ok(json) = serde_json::to_string(result) {
				println!("{json}");
			}
		}
		OutputFormat::Text => print_result_text(result),
	}
}

fn print_result_text<T: Serialize>(result: &CommandResult<T>) {
	let mut stdout = io::stdout().lock();

	if result.ok {
		if let Some(ref data) = result.data {
			if let Ok(json) = serde_json::to_string_pretty(data) {
				let _ = writeln!(stdout, "{json}");
			}
		}
	} else if let Some(ref error) = result.error {
		let _ = writeln!(stdout, "Error [{}]: {}", error.code, error.message);
	}

	if let Some(ref timings) = result.timings {
		let line = format!("{} in {}ms", result.command, timings.duration_ms);
		let _ = writeln!(stdout, "{}", line.as_str().dimmed());
	}
}

/// Prints one streamed run event, outside of any envelope.
pub fn print_event(event: &RunEvent, format: OutputFormat) {
	match format {
		OutputFormat::Json | OutputFormat::Ndjson => {
			if let Ok(json) = serde_json::to_string(event) {
				println!("{json}");
			}
		}
		OutputFormat::Text => println!("{}", event_line(event)),
	}
}

/// One-line rendering of a run event for text output.
pub fn event_line(event: &RunEvent) -> String {
	match event {
		RunEvent::Result {
			testee,
			run_id,
			index,
			passed,
			remaining,
		} => {
			let case = index.iter().map(u32::to_string).collect::<Vec<_>>().join(".");
			let verdict = if *passed { "PASS".green() } else { "FAIL".red() };
			format!("{run_id} {testee} {case} {verdict} ({remaining} remaining)")
		}
		RunEvent::Complete { testee, run_id } => format!("{run_id} {testee} {}", "complete".bold()),
	}
}

pub fn print_error_stderr(error: &CommandError) {
	eprintln!("{} [{}]: {}", "error".red().bold(), error.code, error.message);
}
