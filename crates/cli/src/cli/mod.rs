#[cfg(test)]
mod tests;

use std::path::PathBuf;

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;

/// Cargo-like help colors: green bold headers, cyan literals and placeholders.
fn cli_styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Green.on_default().bold())
		.usage(AnsiColor::Green.on_default().bold())
		.literal(AnsiColor::Cyan.on_default())
		.placeholder(AnsiColor::Cyan.on_default())
		.valid(AnsiColor::Cyan.on_default())
}

/// Root CLI for abtest.
#[derive(Parser, Debug)]
#[command(name = "abtest")]
#[command(about = "Control client for the Autobahn test-suite backend")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: json (default), ndjson, or text
	#[arg(short = 'f', long, global = true, value_enum, default_value = "json")]
	pub format: OutputFormat,

	/// WebSocket URL of the backend, overriding the config file
	#[arg(short, long, global = true, value_name = "URL")]
	pub endpoint: Option<String>,

	/// JSON client config file
	#[arg(short, long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// List the most recent test runs.
	Runs(RunsArgs),
	/// Start a test run for a stored spec.
	Run(RunArgs),
	/// Import or update a spec from a JSON file.
	Import(ImportArgs),
	/// Fetch a spec by name.
	SpecByName(SpecByNameArgs),
	/// Fetch a spec by id.
	Spec(SpecArgs),
	/// List stored specs together with their bodies.
	Specs(SpecsArgs),
	/// Fetch a single test result.
	Result(ResultArgs),
	/// Fetch the per-case index of a test run.
	RunIndex(RunIdArgs),
	/// Fetch the per-testee summary of a test run.
	RunSummary(RunIdArgs),
	/// Stream test run progress events until interrupted.
	Watch(WatchArgs),
}

impl Commands {
	/// Name used in output envelopes.
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Runs(_) => "runs",
			Commands::Run(_) => "run",
			Commands::Import(_) => "import",
			Commands::SpecByName(_) => "spec-by-name",
			Commands::Spec(_) => "spec",
			Commands::Specs(_) => "specs",
			Commands::Result(_) => "result",
			Commands::RunIndex(_) => "run-index",
			Commands::RunSummary(_) => "run-summary",
			Commands::Watch(_) => "watch",
		}
	}
}

#[derive(Args, Debug, Clone)]
pub struct RunsArgs {
	/// Maximum number of runs (defaults to the configured run limit)
	#[arg(short, long, value_name = "N")]
	pub limit: Option<u32>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
	/// Spec name (defaults to the configured spec name)
	#[arg(value_name = "SPEC")]
	pub spec: Option<String>,

	/// Do not store results in the test database
	#[arg(long)]
	pub no_save: bool,

	/// Wait for the run and include its progress events
	#[arg(short, long)]
	pub watch: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
	/// Spec JSON file
	#[arg(value_name = "FILE")]
	pub file: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct SpecByNameArgs {
	/// Spec name (defaults to the configured spec name)
	#[arg(value_name = "NAME")]
	pub name: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SpecArgs {
	#[arg(value_name = "ID")]
	pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct SpecsArgs {
	/// Include inactive specs
	#[arg(short, long)]
	pub all: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ResultArgs {
	#[arg(value_name = "ID")]
	pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct RunIdArgs {
	#[arg(value_name = "RUN_ID")]
	pub run_id: String,
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
	/// Only show events of this run
	#[arg(long, value_name = "RUN_ID")]
	pub run: Option<String>,
}
