//! WAMP v1 runtime for the Autobahn test-suite client.
//!
//! This crate provides the low-level session infrastructure for talking to a
//! WAMP v1 router:
//!
//! - **Transport**: JSON frames over a WebSocket negotiated with the `wamp`
//!   subprotocol, or over in-process channels
//! - **Connection**: `WELCOME` handshake, call correlation, CURIE prefixes,
//!   and event dispatch
//! - **Session contract**: the [`Session`] and [`Connector`] traits consumed by
//!   `ab-client`
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  ab-client  │  Connection manager, facade, sequencer
//! └──────┬──────┘
//!        │ uses Session / Connector
//! ┌──────▼──────┐
//! │  ab-runtime │  This crate
//! │  ┌────────┐ │
//! │  │ Conn   │ │  Call correlation, events
//! │  └────────┘ │
//! │  ┌────────┐ │
//! │  │ Trans  │ │  WebSocket / channel transport
//! │  └────────┘ │
//! └─────────────┘
//! ```

pub mod connection;
pub mod error;
pub mod session;
pub mod transport;

pub use connection::{Connection, WampConnector, Welcome};
pub use error::{Error, Result};
pub use session::{CallFuture, CloseCode, CloseInfo, ClosedSignal, ConnectFuture, Connector, Established, Session};
pub use transport::{
	ChannelPeer, ChannelTransport, Transport, TransportParts, TransportReceiver, WebSocketTransport,
	WebSocketTransportReceiver, WebSocketTransportSender,
};
