use std::path::Path;

use anyhow::Context;
use autobahn_client::{Client, SpecFetch, TestSpec};

use crate::error::{CliError, Result};
use crate::output::{ImportData, SpecEntry};

/// Reads and parses a spec file; validation happens in the client.
pub(super) fn read_spec(path: &Path) -> Result<TestSpec> {
	let content =
		std::fs::read_to_string(path).with_context(|| format!("cannot read spec file {}", path.display()))?;
	let spec = serde_json::from_str(&content).map_err(CliError::SpecFile)?;
	tracing::debug!(path = %path.display(), "Loaded spec file");
	Ok(spec)
}

pub(super) async fn import(client: &Client, spec: &TestSpec) -> Result<ImportData> {
	let outcome = client.import_spec(spec).await?;
	Ok(ImportData::from(&outcome))
}

/// Lists specs with their bodies; a failed body fetch becomes an entry error.
pub(super) async fn list(client: &Client, include_inactive: bool) -> Result<Vec<SpecEntry>> {
	let active_only = if include_inactive { Some(false) } else { None };
	let fetched = client.list_specs(active_only).await?;
	Ok(fetched.into_iter().map(entry).collect())
}

fn entry(fetch: SpecFetch) -> SpecEntry {
	let (spec, error) = match fetch.result {
		Ok(body) => (Some(body), None),
		Err(e) => (None, Some(e.to_string())),
	};
	SpecEntry {
		index: fetch.index,
		spec_id: fetch.spec_id,
		spec,
		error,
	}
}
