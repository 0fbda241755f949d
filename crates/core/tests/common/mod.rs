//! Scripted backend used by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ab_runtime::{CallFuture, CloseCode, CloseInfo, ConnectFuture, Connector, Established, Session};
use autobahn_client::{Client, ClientConfig, ConnectionManager, ConnectionState, Error, Report, Reporter};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{Notify, mpsc, oneshot};

pub type Reply = Pin<Box<dyn Future<Output = ab_runtime::Result<Value>> + Send>>;
type Responder = Box<dyn Fn(&str, &[Value]) -> Reply + Send + Sync>;

/// A call as the session received it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
	pub procedure: String,
	pub args: Vec<Value>,
}

/// Session answering calls through a responder closure.
pub struct MockSession {
	responder: Responder,
	calls: Mutex<Vec<RecordedCall>>,
	prefixes: Mutex<Vec<(String, String)>>,
	topics: Mutex<HashMap<String, mpsc::UnboundedSender<Value>>>,
	refused_topics: Mutex<Vec<String>>,
	unsubscribed: Mutex<Vec<String>>,
	closed_tx: Mutex<Option<oneshot::Sender<CloseInfo>>>,
	closed_rx: Mutex<Option<oneshot::Receiver<CloseInfo>>>,
}

impl MockSession {
	/// Session whose replies may complete asynchronously.
	pub fn new<F>(responder: F) -> Arc<Self>
	where
		F: Fn(&str, &[Value]) -> Reply + Send + Sync + 'static,
	{
		let (closed_tx, closed_rx) = oneshot::channel();
		Arc::new(Self {
			responder: Box::new(responder),
			calls: Mutex::new(Vec::new()),
			prefixes: Mutex::new(Vec::new()),
			topics: Mutex::new(HashMap::new()),
			refused_topics: Mutex::new(Vec::new()),
			unsubscribed: Mutex::new(Vec::new()),
			closed_tx: Mutex::new(Some(closed_tx)),
			closed_rx: Mutex::new(Some(closed_rx)),
		})
	}

	/// Session answering every call immediately.
	pub fn replying<F>(reply: F) -> Arc<Self>
	where
		F: Fn(&str, &[Value]) -> ab_runtime::Result<Value> + Send + Sync + 'static,
	{
		Self::new(move |procedure, args| {
			let result = reply(procedure, args);
			Box::pin(async move { result })
		})
	}

	pub fn calls(&self) -> Vec<RecordedCall> {
		self.calls.lock().clone()
	}

	pub fn prefixes(&self) -> Vec<(String, String)> {
		self.prefixes.lock().clone()
	}

	/// Makes every later subscribe to `topic` fail.
	pub fn refuse_subscribe(&self, topic: &str) {
		self.refused_topics.lock().push(topic.to_string());
	}

	/// Topics released through `unsubscribe`.
	pub fn unsubscribed(&self) -> Vec<String> {
		self.unsubscribed.lock().clone()
	}

	pub fn is_closed(&self) -> bool {
		self.closed_tx.lock().is_none()
	}

	/// Publishes an event to the subscriber of `topic`.
	pub fn publish(&self, topic: &str, event: Value) {
		if let Some(tx) = self.topics.lock().get(topic) {
			let _ = tx.send(event);
		}
	}

	/// Ends the session as if the router went away.
	pub fn lose(&self, info: CloseInfo) {
		self.topics.lock().clear();
		if let Some(tx) = self.closed_tx.lock().take() {
			let _ = tx.send(info);
		}
	}

	pub fn established(self: &Arc<Self>) -> Established {
		let closed_rx = self.closed_rx.lock().take();
		let closed = Box::pin(async move {
			match closed_rx {
				Some(rx) => rx
					.await
					.unwrap_or_else(|_| CloseInfo::new(CloseCode::Lost, "session dropped")),
				None => CloseInfo::new(CloseCode::Lost, "session reused"),
			}
		});
		Established {
			session: Arc::clone(self) as Arc<dyn Session>,
			closed,
		}
	}
}

impl Session for MockSession {
	fn session_id(&self) -> Option<String> {
		Some("mock-session".to_string())
	}

	fn prefix(&self, prefix: &str, uri: &str) -> ab_runtime::Result<()> {
		self.prefixes.lock().push((prefix.to_string(), uri.to_string()));
		Ok(())
	}

	fn call(&self, procedure: &str, args: Vec<Value>) -> CallFuture<'_> {
		self.calls.lock().push(RecordedCall {
			procedure: procedure.to_string(),
			args: args.clone(),
		});
		(self.responder)(procedure, &args)
	}

	fn subscribe(&self, topic: &str) -> ab_runtime::Result<mpsc::UnboundedReceiver<Value>> {
		if self.refused_topics.lock().iter().any(|t| t == topic) {
			return Err(ab_runtime::Error::ChannelClosed);
		}
		let (tx, rx) = mpsc::unbounded_channel();
		self.topics.lock().insert(topic.to_string(), tx);
		Ok(rx)
	}

	fn unsubscribe(&self, topic: &str) -> ab_runtime::Result<()> {
		let mut topics = self.topics.lock();
		if topics.get(topic).is_some_and(|tx| tx.is_closed()) {
			topics.remove(topic);
			self.unsubscribed.lock().push(topic.to_string());
		}
		Ok(())
	}

	fn close(&self) {
		self.lose(CloseInfo::new(CloseCode::Closed, "closed by client"));
	}
}

/// Connector handing out scripted outcomes in order.
#[derive(Default)]
pub struct MockConnector {
	outcomes: Mutex<VecDeque<Result<Arc<MockSession>, CloseInfo>>>,
	endpoints: Mutex<Vec<String>>,
}

impl MockConnector {
	pub fn with_sessions(sessions: impl IntoIterator<Item = Arc<MockSession>>) -> Arc<Self> {
		let connector = Self::default();
		connector.outcomes.lock().extend(sessions.into_iter().map(Ok));
		Arc::new(connector)
	}

	pub fn failing(info: CloseInfo) -> Arc<Self> {
		let connector = Self::default();
		connector.outcomes.lock().push_back(Err(info));
		Arc::new(connector)
	}

	pub fn endpoints(&self) -> Vec<String> {
		self.endpoints.lock().clone()
	}
}

impl Connector for MockConnector {
	fn connect<'a>(&'a self, endpoint: &'a str) -> ConnectFuture<'a> {
		self.endpoints.lock().push(endpoint.to_string());
		let outcome = self
			.outcomes
			.lock()
			.pop_front()
			.unwrap_or_else(|| Err(CloseInfo::new(CloseCode::Unreachable, "no scripted session")));
		Box::pin(async move { outcome.map(|session| session.established()) })
	}
}

/// Connector whose attempts each wait on an optional gate before succeeding.
#[derive(Default)]
pub struct GatedConnector {
	outcomes: Mutex<VecDeque<(Arc<MockSession>, Option<Arc<Notify>>)>>,
	attempts: AtomicUsize,
}

impl GatedConnector {
	pub fn new(outcomes: impl IntoIterator<Item = (Arc<MockSession>, Option<Arc<Notify>>)>) -> Arc<Self> {
		let connector = Self::default();
		connector.outcomes.lock().extend(outcomes);
		Arc::new(connector)
	}

	pub fn attempts(&self) -> usize {
		self.attempts.load(Ordering::SeqCst)
	}
}

impl Connector for GatedConnector {
	fn connect<'a>(&'a self, _endpoint: &'a str) -> ConnectFuture<'a> {
		let outcome = self.outcomes.lock().pop_front();
		self.attempts.fetch_add(1, Ordering::SeqCst);
		Box::pin(async move {
			let (session, gate) = outcome.ok_or_else(|| CloseInfo::new(CloseCode::Unreachable, "no scripted session"))?;
			if let Some(gate) = gate {
				gate.notified().await;
			}
			Ok(session.established())
		})
	}
}

/// Reporter keeping everything it is told.
#[derive(Default)]
pub struct RecordingReporter {
	reports: Mutex<Vec<Report>>,
	errors: Mutex<Vec<(&'static str, String)>>,
}

impl RecordingReporter {
	pub fn reports(&self) -> Vec<Report> {
		self.reports.lock().clone()
	}

	pub fn errors(&self) -> Vec<(&'static str, String)> {
		self.errors.lock().clone()
	}
}

impl Reporter for RecordingReporter {
	fn report(&self, report: Report) {
		self.reports.lock().push(report);
	}

	fn error(&self, operation: &'static str, error: &Error) {
		self.errors.lock().push((operation, error.to_string()));
	}
}

pub struct Harness {
	pub manager: Arc<ConnectionManager>,
	pub client: Client,
	pub reporter: Arc<RecordingReporter>,
	pub connector: Arc<MockConnector>,
}

/// Manager and client over `connector`, not yet started.
pub fn harness(connector: Arc<MockConnector>) -> Harness {
	let manager = Arc::new(ConnectionManager::new(ClientConfig::default(), connector.clone()));
	let reporter = Arc::new(RecordingReporter::default());
	let client = Client::new(Arc::clone(&manager), reporter.clone());
	Harness {
		manager,
		client,
		reporter,
		connector,
	}
}

/// Started harness over a single session.
pub async fn connected(session: Arc<MockSession>) -> Harness {
	let harness = harness(MockConnector::with_sessions([session]));
	harness.manager.start().await.unwrap();
	harness
}

pub async fn wait_for_state(manager: &ConnectionManager, state: ConnectionState) {
	let mut rx = manager.subscribe_state();
	tokio::time::timeout(std::time::Duration::from_secs(1), rx.wait_for(|s| *s == state))
		.await
		.expect("state change timed out")
		.expect("state channel closed");
}

/// Session that must never be called.
pub fn silent_session() -> Arc<MockSession> {
	MockSession::replying(|procedure, _| panic!("unexpected call to {procedure}"))
}
