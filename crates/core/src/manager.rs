//! Connection manager - owns the lifecycle of the single active session.
//!
//! ```text
//! Disconnected ──start()──▶ Connecting ──ok──▶ Connected
//!      ▲                        │                  │
//!      └────────failure─────────┘                  │
//!      └──────────────loss / disconnect()──────────┘
//! ```
//!
//! Nothing reconnects automatically; call [`ConnectionManager::start`] again
//! after a loss.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ab_runtime::{CloseInfo, Connector, Established, WampConnector};
use parking_lot::RwLock;
use tokio::sync::watch;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::services::{TestDb, TestRunner};
use crate::session::SessionHandle;

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
	Disconnected,
	Connecting,
	Connected,
}

struct ActiveSession {
	generation: u64,
	handle: SessionHandle,
}

/// Connects, holds the current session, and clears it when the session ends.
pub struct ConnectionManager {
	connector: Arc<dyn Connector>,
	config: ClientConfig,
	current: RwLock<Option<ActiveSession>>,
	/// Bumped by every `start()`; loss of an older session is ignored.
	generation: AtomicU64,
	state: watch::Sender<ConnectionState>,
}

impl ConnectionManager {
	pub fn new(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
		Self {
			connector,
			config,
			current: RwLock::new(None),
			generation: AtomicU64::new(0),
			state: watch::Sender::new(ConnectionState::Disconnected),
		}
	}

	/// Manager that connects over WebSocket with the configured timeout.
	pub fn from_config(config: ClientConfig) -> Self {
		let connector = Arc::new(WampConnector::new(config.connect_timeout()));
		Self::new(config, connector)
	}

	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Connects to the configured endpoint and makes the session current.
	///
	/// A failed attempt is logged and returned as [`Error::ConnectionLost`].
	pub async fn start(self: &Arc<Self>) -> Result<SessionHandle> {
		let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
		let endpoint = self.config.endpoint.as_str();

		self.state.send_replace(ConnectionState::Connecting);
		tracing::info!(endpoint, "Connecting to test-suite backend");

		let Established { session, closed } = match self.connector.connect(endpoint).await {
			Ok(established) => established,
			Err(info) => {
				tracing::error!(
					endpoint,
					code = %info.code,
					reason = %info.reason,
					detail = ?info.detail,
					"Connection failed"
				);
				self.publish_state();
				return Err(info.into());
			}
		};

		let handle = SessionHandle::new(session);
		if let Err(e) = self.on_ready(&handle) {
			tracing::error!(error = %e, "Session setup failed");
			handle.close();
			self.publish_state();
			return Err(e);
		}

		let (newer, superseded) = {
			let mut current = self.current.write();
			let newer = current
				.as_ref()
				.filter(|active| active.generation > generation)
				.map(|active| active.handle.clone());
			let superseded = match newer {
				Some(_) => None,
				None => current.replace(ActiveSession {
					generation,
					handle: handle.clone(),
				}),
			};
			(newer, superseded)
		};

		// A later start finished first; its session stays current.
		if let Some(newer) = newer {
			tracing::debug!(generation, "Closing session of an outdated start");
			handle.close();
			return Ok(newer);
		}
		if let Some(previous) = superseded {
			tracing::debug!(generation = previous.generation, "Closing superseded session");
			previous.handle.close();
		}
		self.state.send_replace(ConnectionState::Connected);

		let manager = Arc::downgrade(self);
		tokio::spawn(async move {
			let info = closed.await;
			if let Some(manager) = manager.upgrade() {
				manager.handle_loss(generation, info);
			}
		});

		Ok(handle)
	}

	/// Registers the service prefixes on a fresh session.
	fn on_ready(&self, handle: &SessionHandle) -> Result<()> {
		handle.register_prefix(TestDb::PREFIX, &self.config.testdb_uri)?;
		handle.register_prefix(TestRunner::PREFIX, &self.config.testrunner_uri)?;
		tracing::info!(session_id = ?handle.session_id(), "Session ready");
		Ok(())
	}

	fn handle_loss(&self, generation: u64, info: CloseInfo) {
		let mut current = self.current.write();
		let is_current = current.as_ref().is_some_and(|active| active.generation == generation);
		if !is_current {
			tracing::debug!(generation, code = %info.code, "Ignoring end of superseded session");
			return;
		}

		*current = None;
		drop(current);

		tracing::warn!(
			code = %info.code,
			reason = %info.reason,
			detail = ?info.detail,
			"Connection lost"
		);
		self.publish_state();
	}

	/// Closes the current session, if any, and clears it.
	pub fn disconnect(&self) {
		let active = self.current.write().take();
		if let Some(active) = active {
			tracing::info!(session_id = ?active.handle.session_id(), "Disconnecting");
			active.handle.close();
		}
		self.publish_state();
	}

	/// The active session, or `None` while disconnected.
	pub fn current(&self) -> Option<SessionHandle> {
		self.current.read().as_ref().map(|active| active.handle.clone())
	}

	/// The active session, or [`Error::NotConnected`].
	pub fn require(&self) -> Result<SessionHandle> {
		self.current().ok_or(Error::NotConnected)
	}

	pub fn state(&self) -> ConnectionState {
		*self.state.borrow()
	}

	pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
		self.state.subscribe()
	}

	fn publish_state(&self) {
		let state = if self.current.read().is_some() {
			ConnectionState::Connected
		} else {
			ConnectionState::Disconnected
		};
		self.state.send_replace(state);
	}
}
