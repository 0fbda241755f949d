//! WAMP v1 session layer.
//!
//! This module implements call correlation and event dispatch on top of a
//! transport. It handles:
//! - The `WELCOME` handshake
//! - Generating call ids and correlating `CALLRESULT`/`CALLERROR` replies
//! - CURIE expansion through the registered prefix table
//! - Fanning `EVENT`s out to topic subscribers
//!
//! # Call Flow
//!
//! 1. Caller invokes [`Connection::call`] with a procedure URI or CURIE
//! 2. Connection expands the CURIE, generates a call id, and parks a oneshot sender
//! 3. The `CALL` frame is queued for the writer task
//! 4. The run loop receives `CALLRESULT` or `CALLERROR` with the same id
//! 5. The parked sender is completed and the caller's future resolves
//!
//! When the transport ends, every parked call fails with
//! [`Error::ChannelClosed`] and the closed signal fires with the reason.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use ab_protocol::{Message, WAMP_PROTOCOL_VERSION};
use dashmap::DashMap;
use parking_lot::Mutex as ParkingLotMutex;
use serde_json::Value;
use tokio::sync::Mutex as TokioMutex;
use tokio::sync::{mpsc, oneshot, watch};

use crate::error::{Error, Result};
use crate::session::{CallFuture, CloseCode, CloseInfo, ConnectFuture, Connector, Established, Session};
use crate::transport::{Transport, TransportParts, TransportReceiver, WebSocketTransport};

/// Pending call callbacks keyed by call id.
type CallbackMap = Arc<TokioMutex<HashMap<String, oneshot::Sender<Result<Value>>>>>;

/// Handshake data from the router's `WELCOME`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Welcome {
	pub session_id: String,
	pub protocol_version: u64,
	pub server_ident: String,
}

/// Work item for the writer task.
enum Outbound {
	Message(Value),
	Close,
}

/// RAII guard ensuring callback cleanup when a call future is dropped.
struct CancelGuard {
	call_id: String,
	callbacks: CallbackMap,
	completed: bool,
}

impl CancelGuard {
	fn new(call_id: String, callbacks: CallbackMap) -> Self {
		Self {
			call_id,
			callbacks,
			completed: false,
		}
	}

	fn complete(&mut self) {
		self.completed = true;
	}
}

impl Drop for CancelGuard {
	fn drop(&mut self) {
		if self.completed {
			return;
		}

		let call_id = std::mem::take(&mut self.call_id);
		let callbacks = Arc::clone(&self.callbacks);

		if let Ok(handle) = tokio::runtime::Handle::try_current() {
			handle.spawn(async move {
				if callbacks.lock().await.remove(&call_id).is_some() {
					tracing::debug!(%call_id, "CancelGuard: removed orphaned callback");
				}
			});
		}
	}
}

/// Future returned by [`Connection::call`] with automatic cancellation cleanup.
struct ResponseFuture {
	rx: oneshot::Receiver<Result<Value>>,
	guard: CancelGuard,
}

impl Future for ResponseFuture {
	type Output = Result<Value>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(result) => {
				self.guard.complete();
				Poll::Ready(result.map_err(|_| Error::ChannelClosed).and_then(|r| r))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

/// WAMP v1 client session over a transport.
pub struct Connection {
	/// Sequential call id counter
	last_id: AtomicU64,
	/// Pending call callbacks keyed by call id
	callbacks: CallbackMap,
	/// Channel for sending outbound frames to the writer task
	outbound_tx: mpsc::UnboundedSender<Outbound>,
	/// Transport sender (taken by run() to start writer task)
	transport_sender: Arc<TokioMutex<Option<Box<dyn Transport>>>>,
	/// Receiver for incoming frames from transport
	message_rx: Arc<TokioMutex<Option<mpsc::UnboundedReceiver<Value>>>>,
	/// Receiver half of transport (owned by the reader task once running)
	transport_receiver: Arc<TokioMutex<Option<Box<dyn TransportReceiver>>>>,
	/// Receiver for outbound frames (taken by run() to start writer task)
	outbound_rx: Arc<TokioMutex<Option<mpsc::UnboundedReceiver<Outbound>>>>,
	/// CURIE prefix table
	prefixes: ParkingLotMutex<HashMap<String, String>>,
	/// Event subscribers keyed by full topic URI
	subscriptions: DashMap<String, Vec<mpsc::UnboundedSender<Value>>>,
	welcome: watch::Sender<Option<Welcome>>,
	closed: watch::Sender<Option<CloseInfo>>,
}

impl Connection {
	/// Create a new Connection with the given transport
	pub fn new(parts: TransportParts) -> Self {
		let TransportParts {
			sender,
			receiver,
			message_rx,
		} = parts;

		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

		Self {
			last_id: AtomicU64::new(0),
			callbacks: Arc::new(TokioMutex::new(HashMap::new())),
			outbound_tx,
			transport_sender: Arc::new(TokioMutex::new(Some(sender))),
			message_rx: Arc::new(TokioMutex::new(Some(message_rx))),
			transport_receiver: Arc::new(TokioMutex::new(Some(receiver))),
			outbound_rx: Arc::new(TokioMutex::new(Some(outbound_rx))),
			prefixes: ParkingLotMutex::new(HashMap::new()),
			subscriptions: DashMap::new(),
			welcome: watch::Sender::new(None),
			closed: watch::Sender::new(None),
		}
	}

	/// Runs the connection on a background task and waits for `WELCOME`.
	///
	/// Any failure is reported as the [`CloseInfo`] a connect attempt ends with.
	pub async fn establish(
		parts: TransportParts,
		handshake_timeout: Duration,
	) -> std::result::Result<Established, CloseInfo> {
		let connection = Arc::new(Self::new(parts));

		let runner = Arc::clone(&connection);
		tokio::spawn(async move {
			if let Err(e) = runner.run().await {
				tracing::error!(error = %e, "Connection run loop failed");
			}
		});

		match connection.welcome(handshake_timeout).await {
			Ok(welcome) => {
				tracing::info!(
					session_id = %welcome.session_id,
					server = %welcome.server_ident,
					"WAMP session established"
				);
				let closed = Box::pin(connection.closed());
				Ok(Established {
					session: connection,
					closed,
				})
			}
			Err(e) => {
				connection.close();
				Err(match e {
					Error::Unsupported(detail) => {
						CloseInfo::new(CloseCode::Unsupported, "router does not speak WAMP v1").with_detail(detail)
					}
					other => CloseInfo::new(CloseCode::Unreachable, "handshake failed").with_detail(other.to_string()),
				})
			}
		}
	}

	/// Waits for the router's `WELCOME`.
	///
	/// Fails with [`Error::Unsupported`] if the router announces a protocol
	/// version other than 1, and with [`Error::Timeout`] if nothing arrives
	/// within `timeout`.
	pub async fn welcome(&self, timeout: Duration) -> Result<Welcome> {
		let mut welcome_rx = self.welcome.subscribe();
		let mut closed_rx = self.closed.subscribe();

		let wait = async {
			tokio::select! {
				welcome = welcome_rx.wait_for(Option::is_some) => {
					welcome.ok().and_then(|w| w.clone()).ok_or(Error::ChannelClosed)
				}
				closed = closed_rx.wait_for(Option::is_some) => {
					let reason = closed
						.ok()
						.and_then(|c| c.as_ref().map(ToString::to_string))
						.unwrap_or_default();
					Err(Error::ConnectionFailed(reason))
				}
			}
		};

		let welcome = tokio::time::timeout(timeout, wait)
			.await
			.map_err(|_| Error::Timeout(format!("no WELCOME within {}ms", timeout.as_millis())))??;

		if welcome.protocol_version != WAMP_PROTOCOL_VERSION {
			return Err(Error::Unsupported(format!(
				"protocol version {} (server {})",
				welcome.protocol_version, welcome.server_ident
			)));
		}
		Ok(welcome)
	}

	/// Session id from `WELCOME`, once received.
	pub fn session_id(&self) -> Option<String> {
		self.welcome.borrow().as_ref().map(|w| w.session_id.clone())
	}

	/// Registers a CURIE prefix locally and with the router.
	pub fn prefix(&self, prefix: &str, uri: &str) -> Result<()> {
		self.prefixes.lock().insert(prefix.to_string(), uri.to_string());
		tracing::debug!(prefix, uri, "Registering prefix");
		self.send(Message::Prefix {
			prefix: prefix.to_string(),
			uri: uri.to_string(),
		})
	}

	/// Expands `prefix:suffix` if `prefix` is registered; other URIs pass through.
	pub fn resolve(&self, uri: &str) -> String {
		if let Some((prefix, suffix)) = uri.split_once(':') {
			if let Some(base) = self.prefixes.lock().get(prefix) {
				return format!("{base}{suffix}");
			}
		}
		uri.to_string()
	}

	/// Calls a remote procedure and awaits its result.
	pub async fn call(&self, procedure: &str, args: Vec<Value>) -> Result<Value> {
		let call_id = self.last_id.fetch_add(1, Ordering::SeqCst).to_string();
		let procedure = self.resolve(procedure);

		tracing::debug!(%call_id, %procedure, "Calling");

		let (tx, rx) = oneshot::channel();
		self.callbacks.lock().await.insert(call_id.clone(), tx);

		let guard = CancelGuard::new(call_id.clone(), Arc::clone(&self.callbacks));

		let is_closed = self.closed.borrow().is_some();
		if is_closed {
			return Err(Error::ChannelClosed);
		}

		self.send(Message::Call {
			call_id,
			procedure,
			args,
		})?;

		ResponseFuture { rx, guard }.await
	}

	/// Subscribes to a topic. The first subscriber for a topic sends `SUBSCRIBE`.
	pub fn subscribe(&self, topic: &str) -> Result<mpsc::UnboundedReceiver<Value>> {
		let is_closed = self.closed.borrow().is_some();
		if is_closed {
			return Err(Error::ChannelClosed);
		}

		let topic = self.resolve(topic);
		let (tx, rx) = mpsc::unbounded_channel();

		let first = {
			let mut subscribers = self.subscriptions.entry(topic.clone()).or_default();
			subscribers.push(tx);
			subscribers.len() == 1
		};

		if first {
			tracing::debug!(%topic, "Subscribing");
			self.send(Message::Subscribe { topic })?;
		}
		Ok(rx)
	}

	/// Forgets subscribers of `topic` whose receivers were dropped, sending
	/// `UNSUBSCRIBE` if none remain.
	pub fn unsubscribe(&self, topic: &str) -> Result<()> {
		let topic = self.resolve(topic);
		if let Some(mut subscribers) = self.subscriptions.get_mut(&topic) {
			subscribers.retain(|tx| !tx.is_closed());
		}
		self.unsubscribe_if_drained(topic)
	}

	/// Asks the transport to close. [`closed`](Self::closed) resolves once it has.
	pub fn close(&self) {
		if self.outbound_tx.send(Outbound::Close).is_err() {
			tracing::debug!("Close requested on a connection that already ended");
		}
	}

	/// Resolves with the reason once the connection has ended.
	pub fn closed(&self) -> impl Future<Output = CloseInfo> + Send + 'static {
		let mut closed_rx = self.closed.subscribe();
		async move {
			let info = closed_rx.wait_for(Option::is_some).await.map(|c| c.clone());
			match info {
				Ok(Some(info)) => info,
				_ => CloseInfo::new(CloseCode::Lost, "connection dropped"),
			}
		}
	}

	fn send(&self, message: Message) -> Result<()> {
		self.outbound_tx.send(Outbound::Message(message.to_value())).map_err(|_| {
			tracing::error!("Failed to queue message: outbound channel closed");
			Error::ChannelClosed
		})
	}

	/// Run the message dispatch loop until the transport ends.
	pub async fn run(self: &Arc<Self>) -> Result<()> {
		let mut transport_receiver = take_once(&self.transport_receiver, "transport receiver").await?;
		let mut transport_sender = take_once(&self.transport_sender, "transport sender").await?;
		let mut outbound_rx = take_once(&self.outbound_rx, "outbound receiver").await?;
		let mut message_rx = take_once(&self.message_rx, "message receiver").await?;

		let reader_handle = tokio::spawn(async move { transport_receiver.run().await });

		let writer_handle = tokio::spawn(async move {
			while let Some(outbound) = outbound_rx.recv().await {
				match outbound {
					Outbound::Message(message) => {
						if let Err(e) = transport_sender.send(message).await {
							tracing::error!(error = %e, "Transport write error");
							break;
						}
					}
					Outbound::Close => {
						if let Err(e) = transport_sender.close().await {
							tracing::warn!(error = %e, "Transport close error");
						}
						break;
					}
				}
			}
		});

		while let Some(message_value) = message_rx.recv().await {
			match Message::from_value(message_value) {
				Ok(message) => {
					if let Err(e) = self.dispatch_internal(message).await {
						tracing::error!(error = %e, "Error dispatching message");
					}
				}
				Err(e) => {
					tracing::error!(error = %e, "Failed to decode message");
				}
			}
		}

		let info = reader_handle.await.unwrap_or_else(|e| {
			CloseInfo::new(CloseCode::Lost, "transport reader failed").with_detail(e.to_string())
		});
		writer_handle.abort();

		self.shutdown(info).await;
		Ok(())
	}

	/// Dispatch an incoming message (test-only public version)
	#[cfg(test)]
	pub async fn dispatch(self: &Arc<Self>, message: Message) -> Result<()> {
		self.dispatch_internal(message).await
	}

	async fn dispatch_internal(self: &Arc<Self>, message: Message) -> Result<()> {
		tracing::trace!(kind = ?message.kind(), "Dispatching message");
		match message {
			Message::Welcome {
				session_id,
				protocol_version,
				server_ident,
			} => {
				self.welcome.send_replace(Some(Welcome {
					session_id,
					protocol_version,
					server_ident,
				}));
				Ok(())
			}
			Message::CallResult { call_id, result } => self.complete(&call_id, Ok(result)).await,
			Message::CallError {
				call_id,
				error_uri,
				description,
				details,
			} => {
				let error = Error::Remote {
					uri: error_uri,
					description,
					details,
				};
				self.complete(&call_id, Err(error)).await
			}
			Message::Event { topic, event } => {
				self.deliver_event(topic, event);
				Ok(())
			}
			other => {
				tracing::debug!(kind = ?other.kind(), "Ignoring client-bound message from router");
				Ok(())
			}
		}
	}

	async fn complete(&self, call_id: &str, result: Result<Value>) -> Result<()> {
		let callback = self
			.callbacks
			.lock()
			.await
			.remove(call_id)
			.ok_or_else(|| Error::ProtocolError(format!("Cannot find call to complete: id={call_id}")))?;

		let _ = callback.send(result);
		Ok(())
	}

	fn deliver_event(&self, topic: String, event: Value) {
		let topic = self.resolve(&topic);

		let drained = match self.subscriptions.get_mut(&topic) {
			Some(mut subscribers) => {
				subscribers.retain(|tx| tx.send(event.clone()).is_ok());
				subscribers.is_empty()
			}
			None => {
				tracing::debug!(%topic, "Event for topic without subscribers (ignored)");
				false
			}
		};

		if drained {
			let _ = self.unsubscribe_if_drained(topic);
		}
	}

	fn unsubscribe_if_drained(&self, topic: String) -> Result<()> {
		if self.subscriptions.remove_if(&topic, |_, s| s.is_empty()).is_some() {
			tracing::debug!(%topic, "Last subscriber gone, unsubscribing");
			self.send(Message::Unsubscribe { topic })?;
		}
		Ok(())
	}

	async fn shutdown(&self, info: CloseInfo) {
		tracing::info!(code = %info.code, reason = %info.reason, "WAMP session ended");

		self.closed.send_replace(Some(info));

		let pending: Vec<_> = self.callbacks.lock().await.drain().collect();
		for (call_id, callback) in pending {
			tracing::debug!(%call_id, "Failing pending call");
			let _ = callback.send(Err(Error::ChannelClosed));
		}

		self.subscriptions.clear();
	}
}

async fn take_once<T>(slot: &TokioMutex<Option<T>>, what: &str) -> Result<T> {
	slot.lock()
		.await
		.take()
		.ok_or_else(|| Error::ProtocolError(format!("run() can only be called once - {what} already taken")))
}

impl Session for Connection {
	fn session_id(&self) -> Option<String> {
		Connection::session_id(self)
	}

	fn prefix(&self, prefix: &str, uri: &str) -> Result<()> {
		Connection::prefix(self, prefix, uri)
	}

	fn call(&self, procedure: &str, args: Vec<Value>) -> CallFuture<'_> {
		let procedure = procedure.to_string();
		Box::pin(async move { Connection::call(self, &procedure, args).await })
	}

	fn subscribe(&self, topic: &str) -> Result<mpsc::UnboundedReceiver<Value>> {
		Connection::subscribe(self, topic)
	}

	fn unsubscribe(&self, topic: &str) -> Result<()> {
		Connection::unsubscribe(self, topic)
	}

	fn close(&self) {
		Connection::close(self)
	}
}

/// Connects to a router over WebSocket.
#[derive(Debug, Clone)]
pub struct WampConnector {
	handshake_timeout: Duration,
}

impl WampConnector {
	pub fn new(handshake_timeout: Duration) -> Self {
		Self { handshake_timeout }
	}
}

impl Default for WampConnector {
	fn default() -> Self {
		Self::new(Duration::from_secs(10))
	}
}

impl Connector for WampConnector {
	fn connect<'a>(&'a self, endpoint: &'a str) -> ConnectFuture<'a> {
		Box::pin(async move {
			let parts = WebSocketTransport::connect(endpoint).await.map_err(|e| match e {
				Error::Unsupported(detail) => {
					CloseInfo::new(CloseCode::Unsupported, "router does not speak WAMP v1").with_detail(detail)
				}
				other => CloseInfo::new(CloseCode::Unreachable, "could not reach router").with_detail(other.to_string()),
			})?;
			Connection::establish(parts, self.handshake_timeout).await
		})
	}
}
