//! Message transports.
//!
//! A transport is split into three parts so the connection can drive reading
//! and writing from separate tasks:
//!
//! - a [`Transport`] sender that writes JSON frames,
//! - a [`TransportReceiver`] that pumps incoming frames into a channel until
//!   the connection ends, then reports why,
//! - the receiving end of that channel.
//!
//! [`WebSocketTransport`] speaks to a real router. [`ChannelTransport`] is an
//! in-process pair whose far end ([`ChannelPeer`]) plays the router in tests.

use std::future::Future;
use std::pin::Pin;

use ab_protocol::{Message, WAMP_SUBPROTOCOL};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::error::{Error, Result};
use crate::session::{CloseCode, CloseInfo};

/// Write half of a transport.
pub trait Transport: Send {
	/// Sends one JSON frame.
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

	/// Initiates a clean close.
	fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Read half of a transport.
pub trait TransportReceiver: Send {
	/// Forwards incoming frames until the connection ends.
	fn run(&mut self) -> Pin<Box<dyn Future<Output = CloseInfo> + Send + '_>>;
}

/// A transport split for use by [`Connection`](crate::Connection).
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
	pub message_rx: mpsc::UnboundedReceiver<Value>,
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport negotiating the `wamp` subprotocol.
pub struct WebSocketTransport;

impl WebSocketTransport {
	/// Opens a WebSocket to `url` and splits it into transport parts.
	///
	/// Fails with [`Error::Unsupported`] if the server does not accept the
	/// `wamp` subprotocol.
	pub async fn connect(url: &str) -> Result<TransportParts> {
		let mut request = url
			.into_client_request()
			.map_err(|e| Error::ConnectionFailed(format!("invalid endpoint '{url}': {e}")))?;
		request
			.headers_mut()
			.insert("Sec-WebSocket-Protocol", HeaderValue::from_static(WAMP_SUBPROTOCOL));

		tracing::debug!(url, "Opening WebSocket");

		let (stream, response) = connect_async(request).await.map_err(|e| match e {
			tungstenite::Error::Protocol(ProtocolError::SecWebSocketSubProtocolError(err)) => {
				Error::Unsupported(err.to_string())
			}
			other => Error::ConnectionFailed(other.to_string()),
		})?;

		let negotiated = response
			.headers()
			.get("Sec-WebSocket-Protocol")
			.and_then(|v| v.to_str().ok());
		if negotiated != Some(WAMP_SUBPROTOCOL) {
			return Err(Error::Unsupported(format!(
				"server negotiated subprotocol {negotiated:?}"
			)));
		}

		Ok(Self::into_parts(stream))
	}

	fn into_parts(stream: WsStream) -> TransportParts {
		let (sink, stream) = stream.split();
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		TransportParts {
			sender: Box::new(WebSocketTransportSender { sink }),
			receiver: Box::new(WebSocketTransportReceiver { stream, message_tx }),
			message_rx,
		}
	}
}

/// Write half of [`WebSocketTransport`].
pub struct WebSocketTransportSender {
	sink: SplitSink<WsStream, WsMessage>,
}

impl Transport for WebSocketTransportSender {
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			let text = serde_json::to_string(&message)?;
			self.sink
				.send(WsMessage::Text(text))
				.await
				.map_err(|e| Error::TransportError(e.to_string()))
		})
	}

	fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			self.sink
				.send(WsMessage::Close(None))
				.await
				.map_err(|e| Error::TransportError(e.to_string()))
		})
	}
}

/// Read half of [`WebSocketTransport`].
pub struct WebSocketTransportReceiver {
	stream: SplitStream<WsStream>,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl TransportReceiver for WebSocketTransportReceiver {
	fn run(&mut self) -> Pin<Box<dyn Future<Output = CloseInfo> + Send + '_>> {
		Box::pin(async move {
			while let Some(frame) = self.stream.next().await {
				match frame {
					Ok(WsMessage::Text(text)) => match serde_json::from_str::<Value>(&text) {
						Ok(value) => {
							if self.message_tx.send(value).is_err() {
								return CloseInfo::new(CloseCode::Closed, "connection dropped locally");
							}
						}
						Err(e) => tracing::warn!(error = %e, "Ignoring non-JSON text frame"),
					},
					Ok(WsMessage::Close(frame)) => {
						let mut info = CloseInfo::new(CloseCode::Closed, "closed by server");
						if let Some(frame) = frame {
							info = info.with_detail(format!("{} {}", u16::from(frame.code), frame.reason));
						}
						return info;
					}
					Ok(WsMessage::Binary(_)) => tracing::debug!("Ignoring binary frame"),
					Ok(_) => {}
					Err(e) => {
						tracing::error!(error = %e, "WebSocket read error");
						return CloseInfo::new(CloseCode::Lost, "read error").with_detail(e.to_string());
					}
				}
			}
			CloseInfo::new(CloseCode::Lost, "stream ended")
		})
	}
}

/// In-process transport pair.
pub struct ChannelTransport;

impl ChannelTransport {
	/// Creates connected transport parts and the peer that drives them.
	pub fn pair() -> (TransportParts, ChannelPeer) {
		let (to_client_tx, to_client_rx) = mpsc::unbounded_channel();
		let (to_peer_tx, to_peer_rx) = mpsc::unbounded_channel();
		let (control_tx, control_rx) = mpsc::unbounded_channel();
		let (message_tx, message_rx) = mpsc::unbounded_channel();

		let parts = TransportParts {
			sender: Box::new(ChannelTransportSender {
				to_peer: to_peer_tx,
				control: control_tx.clone(),
			}),
			receiver: Box::new(ChannelTransportReceiver {
				wire: to_client_rx,
				control: control_rx,
				message_tx,
			}),
			message_rx,
		};

		let peer = ChannelPeer {
			to_client: to_client_tx,
			from_client: to_peer_rx,
			control: control_tx,
		};

		(parts, peer)
	}
}

struct ChannelTransportSender {
	to_peer: mpsc::UnboundedSender<Value>,
	control: mpsc::UnboundedSender<CloseInfo>,
}

impl Transport for ChannelTransportSender {
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		let result = self.to_peer.send(message).map_err(|_| Error::ChannelClosed);
		Box::pin(async move { result })
	}

	fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		let result = self
			.control
			.send(CloseInfo::new(CloseCode::Closed, "closed by client"))
			.map_err(|_| Error::ChannelClosed);
		Box::pin(async move { result })
	}
}

struct ChannelTransportReceiver {
	wire: mpsc::UnboundedReceiver<Value>,
	control: mpsc::UnboundedReceiver<CloseInfo>,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl TransportReceiver for ChannelTransportReceiver {
	fn run(&mut self) -> Pin<Box<dyn Future<Output = CloseInfo> + Send + '_>> {
		Box::pin(async move {
			loop {
				tokio::select! {
					biased;
					frame = self.wire.recv() => match frame {
						Some(value) => {
							if self.message_tx.send(value).is_err() {
								return CloseInfo::new(CloseCode::Closed, "connection dropped locally");
							}
						}
						None => {
							return self
								.control
								.try_recv()
								.unwrap_or_else(|_| CloseInfo::new(CloseCode::Lost, "peer dropped"));
						}
					},
					info = self.control.recv() => match info {
						Some(info) => return info,
						None => return CloseInfo::new(CloseCode::Lost, "peer dropped"),
					},
				}
			}
		})
	}
}

/// Far end of a [`ChannelTransport`].
pub struct ChannelPeer {
	to_client: mpsc::UnboundedSender<Value>,
	from_client: mpsc::UnboundedReceiver<Value>,
	control: mpsc::UnboundedSender<CloseInfo>,
}

impl ChannelPeer {
	/// Delivers a raw frame to the client.
	pub fn send(&self, value: Value) -> Result<()> {
		self.to_client.send(value).map_err(|_| Error::ChannelClosed)
	}

	/// Delivers a WAMP message to the client.
	pub fn send_message(&self, message: &Message) -> Result<()> {
		self.send(message.to_value())
	}

	/// Receives the next raw frame written by the client.
	pub async fn recv(&mut self) -> Option<Value> {
		self.from_client.recv().await
	}

	/// Receives and decodes the next WAMP message written by the client.
	pub async fn recv_message(&mut self) -> Option<Message> {
		let value = self.recv().await?;
		Message::from_value(value).ok()
	}

	/// Ends the connection from the peer side.
	pub fn close(self, info: CloseInfo) {
		let _ = self.control.send(info);
	}
}
