use ab_cli::cli::Cli;
use ab_cli::error::CliError;
use ab_cli::output::{self, OutputFormat, ResultBuilder};
use ab_cli::{commands, logging};
use clap::Parser;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let format = cli.format;
	let command = cli.command.name();

	if let Err(err) = commands::dispatch(cli).await {
		handle_error(command, err, format);
		std::process::exit(1);
	}
}

fn handle_error(command: &'static str, err: CliError, format: OutputFormat) {
	let cmd_error = err.to_command_error();

	output::print_error_stderr(&cmd_error);

	// Machine formats still get an envelope on stdout.
	if format != OutputFormat::Text {
		let result: output::EmptyResult = ResultBuilder::new(command).failure(cmd_error).build();
		output::print_result(&result, format);
	}
}
