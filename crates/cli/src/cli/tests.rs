use std::path::PathBuf;

use clap::Parser;

use super::*;

#[test]
fn parse_runs_with_limit() {
	let cli = Cli::try_parse_from(["abtest", "runs", "--limit", "12"]).unwrap();

	match cli.command {
		Commands::Runs(args) => assert_eq!(args.limit, Some(12)),
		_ => panic!("Expected Runs command"),
	}
	assert_eq!(cli.format, OutputFormat::Json);
	assert_eq!(cli.verbose, 0);
}

#[test]
fn parse_runs_default_limit() {
	let cli = Cli::try_parse_from(["abtest", "runs"]).unwrap();

	match cli.command {
		Commands::Runs(args) => assert_eq!(args.limit, None),
		_ => panic!("Expected Runs command"),
	}
}

#[test]
fn parse_run_flags() {
	let cli = Cli::try_parse_from(["abtest", "run", "Nightly", "--no-save", "--watch"]).unwrap();

	match cli.command {
		Commands::Run(args) => {
			assert_eq!(args.spec.as_deref(), Some("Nightly"));
			assert!(args.no_save);
			assert!(args.watch);
		}
		_ => panic!("Expected Run command"),
	}
}

#[test]
fn parse_run_without_spec() {
	let cli = Cli::try_parse_from(["abtest", "run"]).unwrap();

	match cli.command {
		Commands::Run(args) => {
			assert_eq!(args.spec, None);
			assert!(!args.no_save);
			assert!(!args.watch);
		}
		_ => panic!("Expected Run command"),
	}
}

#[test]
fn parse_import_requires_file() {
	assert!(Cli::try_parse_from(["abtest", "import"]).is_err());

	let cli = Cli::try_parse_from(["abtest", "import", "specs/local.json"]).unwrap();
	match cli.command {
		Commands::Import(args) => assert_eq!(args.file, PathBuf::from("specs/local.json")),
		_ => panic!("Expected Import command"),
	}
}

#[test]
fn parse_global_flags_after_subcommand() {
	let cli = Cli::try_parse_from([
		"abtest",
		"specs",
		"--all",
		"--endpoint",
		"ws://10.0.0.5:8090/ws",
		"--config",
		"client.json",
		"-vv",
		"-f",
		"text",
	])
	.unwrap();

	assert_eq!(cli.endpoint.as_deref(), Some("ws://10.0.0.5:8090/ws"));
	assert_eq!(cli.config, Some(PathBuf::from("client.json")));
	assert_eq!(cli.verbose, 2);
	assert_eq!(cli.format, OutputFormat::Text);
	assert!(matches!(cli.command, Commands::Specs(SpecsArgs { all: true })));
}

#[test]
fn parse_run_id_commands() {
	let cli = Cli::try_parse_from(["abtest", "run-index", "run-7"]).unwrap();
	assert!(matches!(&cli.command, Commands::RunIndex(args) if args.run_id == "run-7"));
	assert_eq!(cli.command.name(), "run-index");

	let cli = Cli::try_parse_from(["abtest", "run-summary", "run-7"]).unwrap();
	assert!(matches!(&cli.command, Commands::RunSummary(args) if args.run_id == "run-7"));
	assert_eq!(cli.command.name(), "run-summary");

	assert!(Cli::try_parse_from(["abtest", "run-index"]).is_err());
}

#[test]
fn parse_spec_by_name_optional() {
	let cli = Cli::try_parse_from(["abtest", "spec-by-name"]).unwrap();
	assert!(matches!(cli.command, Commands::SpecByName(SpecByNameArgs { name: None })));
}

#[test]
fn parse_watch_filter() {
	let cli = Cli::try_parse_from(["abtest", "watch", "--run", "run-3"]).unwrap();
	match cli.command {
		Commands::Watch(args) => assert_eq!(args.run.as_deref(), Some("run-3")),
		_ => panic!("Expected Watch command"),
	}
}

#[test]
fn unknown_format_is_rejected() {
	assert!(Cli::try_parse_from(["abtest", "-f", "toon", "runs"]).is_err());
}
