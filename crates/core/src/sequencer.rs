//! List-then-detail sequencing.
//!
//! Detail fetches run as independent tasks and complete in any order. Each
//! carries its position in the metadata list, so callers see results in
//! list order regardless of when they arrived.

use ab_protocol::SpecMetadata;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::client::Client;
use crate::error::Result;

/// Outcome of fetching one spec body.
#[derive(Debug)]
pub struct SpecFetch {
	/// Position of the spec in the metadata list.
	pub index: usize,
	pub spec_id: String,
	pub result: Result<Value>,
}

/// Issues one `get_spec` per entry without waiting on earlier ones.
///
/// Returns one [`SpecFetch`] per entry, ordered by index.
pub async fn fetch_specs(client: &Client, specs: &[SpecMetadata]) -> Vec<SpecFetch> {
	let (done_tx, mut done_rx) = mpsc::unbounded_channel();

	for (index, metadata) in specs.iter().enumerate() {
		let client = client.clone();
		let done_tx = done_tx.clone();
		let spec_id = metadata.id.clone();

		tokio::spawn(async move {
			let result = client.get_spec(index, &spec_id).await;
			let _ = done_tx.send(SpecFetch { index, spec_id, result });
		});
	}
	drop(done_tx);

	let mut fetched = Vec::with_capacity(specs.len());
	while let Some(fetch) = done_rx.recv().await {
		tracing::debug!(index = fetch.index, spec_id = %fetch.spec_id, ok = fetch.result.is_ok(), "Spec detail settled");
		fetched.push(fetch);
	}

	if fetched.len() < specs.len() {
		tracing::warn!(expected = specs.len(), settled = fetched.len(), "Some spec detail tasks did not finish");
	}

	fetched.sort_by_key(|fetch| fetch.index);
	fetched
}
