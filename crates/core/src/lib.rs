//! Control client for the Autobahn test-suite backend.
//!
//! The backend exposes two WAMP v1 services, `testdb` and `testrunner`. This
//! crate manages the session to it and wraps each remote procedure in a typed
//! operation:
//!
//! - [`ConnectionManager`]: connects, registers the service prefixes, and
//!   clears the session when it ends
//! - [`Client`]: one method per remote procedure, reporting every outcome
//!   through a [`Reporter`]
//! - [`sequencer`]: concurrent per-spec detail fetches that keep list order
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use autobahn_client::{Client, ClientConfig, ConnectionManager};
//!
//! let manager = Arc::new(ConnectionManager::from_config(ClientConfig::default()));
//! manager.start().await?;
//!
//! let client = Client::with_log_reporter(manager);
//! let started = client.start_test_run(None).await?;
//! println!("{} ({} results)", started.run_id, started.result_count());
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod manager;
pub mod reporter;
pub mod sequencer;
pub mod services;
pub mod session;

pub use ab_protocol::{
	RunEvent, SpecImportOutcome, SpecMetadata, TestResult, TestRunIndexEntry, TestRunStartResult, TestRunSummary,
	TestSpec, TesteeSummary,
};
pub use ab_runtime::{CloseCode, CloseInfo, Connector, Session};
pub use client::Client;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use manager::{ConnectionManager, ConnectionState};
pub use reporter::{LogReporter, Report, Reporter};
pub use sequencer::SpecFetch;
pub use services::{TestDb, TestRunner};
pub use session::SessionHandle;
