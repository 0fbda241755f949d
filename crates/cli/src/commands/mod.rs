//! Subcommand dispatch.
//!
//! Every subcommand opens its own session, performs one facade operation and
//! prints a single result envelope. `run --watch` and `watch` additionally
//! follow run progress events before printing.

mod run;
mod specs;

use std::sync::Arc;

use autobahn_client::{Client, ClientConfig, ConnectionManager};
use serde::Serialize;
use serde_json::Value;

use crate::cli::{Cli, Commands};
use crate::error::Result;
use crate::output::{self, ResultBuilder, SpecData};

/// Session and client for one command; the session is closed on drop.
struct Backend {
	manager: Arc<ConnectionManager>,
	client: Client,
}

impl Backend {
	async fn connect(config: ClientConfig) -> Result<Self> {
		let manager = Arc::new(ConnectionManager::from_config(config));
		manager.start().await?;
		let client = Client::with_log_reporter(Arc::clone(&manager));
		Ok(Self { manager, client })
	}
}

impl Drop for Backend {
	fn drop(&mut self) {
		self.manager.disconnect();
	}
}

/// Resolves the client config from `--config` and `--endpoint`.
pub fn resolve_config(cli: &Cli) -> Result<ClientConfig> {
	let mut config = ClientConfig::load_or_default(cli.config.as_deref())?;
	if let Some(endpoint) = &cli.endpoint {
		config = config.with_endpoint(endpoint.clone());
	}
	Ok(config)
}

pub async fn dispatch(cli: Cli) -> Result<()> {
	let format = cli.format;
	let builder = ResultBuilder::<Value>::new(cli.command.name());
	let config = resolve_config(&cli)?;

	// Local input is checked before any session is opened.
	let spec = match &cli.command {
		Commands::Import(args) => Some(specs::read_spec(&args.file)?),
		_ => None,
	};

	let backend = Backend::connect(config).await?;
	let client = &backend.client;

	let data = match cli.command {
		Commands::Runs(args) => {
			let runs = client.list_test_runs(args.limit).await?;
			to_data(runs.into_iter().map(|run| run.0).collect::<Vec<_>>())
		}
		Commands::Run(args) => to_data(run::run(client, &args, format).await?),
		Commands::Import(_) => match spec {
			Some(spec) => to_data(specs::import(client, &spec).await?),
			None => Value::Null,
		},
		Commands::SpecByName(args) => {
			let (spec_id, spec) = client.get_spec_by_name(args.name.as_deref()).await?;
			to_data(SpecData { spec_id, spec })
		}
		Commands::Spec(args) => {
			let spec = client.get_spec(0, &args.id).await?;
			to_data(SpecData {
				spec_id: args.id,
				spec,
			})
		}
		Commands::Specs(args) => to_data(specs::list(client, args.all).await?),
		Commands::Result(args) => to_data(client.get_test_result(&args.id).await?.0),
		Commands::RunIndex(args) => to_data(client.get_test_run_index(&args.run_id).await?),
		Commands::RunSummary(args) => to_data(client.get_test_run_summary(&args.run_id).await?),
		Commands::Watch(args) => {
			let count = run::watch(client, args.run.as_deref(), format).await?;
			serde_json::json!({ "events": count })
		}
	};

	output::print_result(&builder.data(data).build(), format);
	Ok(())
}

fn to_data<T: Serialize>(data: T) -> Value {
	serde_json::to_value(data).unwrap_or_else(|e| {
		tracing::error!(error = %e, "Failed to serialize command data");
		Value::Null
	})
}
