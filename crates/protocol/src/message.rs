//! WAMP v1 message framing.
//!
//! Every WAMP v1 message is a JSON array whose first element is the numeric
//! message type. The layouts handled here:
//!
//! ```text
//! WELCOME     [0, sessionId, protocolVersion, serverIdent]
//! PREFIX      [1, prefix, uri]
//! CALL        [2, callId, procUri, arg, ...]
//! CALLRESULT  [3, callId, result]
//! CALLERROR   [4, callId, errorUri, errorDesc, errorDetails?]
//! SUBSCRIBE   [5, topicUri]
//! UNSUBSCRIBE [6, topicUri]
//! PUBLISH     [7, topicUri, event, excludeMe?]
//! EVENT       [8, topicUri, event]
//! ```
//!
//! Messages are converted to and from [`serde_json::Value`] so the transport
//! layer stays agnostic of WAMP.

use serde_json::Value;
use thiserror::Error;

/// WebSocket subprotocol negotiated for WAMP v1.
pub const WAMP_SUBPROTOCOL: &str = "wamp";

/// The only protocol version this client speaks.
pub const WAMP_PROTOCOL_VERSION: u64 = 1;

/// Numeric WAMP v1 message type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
	Welcome = 0,
	Prefix = 1,
	Call = 2,
	CallResult = 3,
	CallError = 4,
	Subscribe = 5,
	Unsubscribe = 6,
	Publish = 7,
	Event = 8,
}

impl MessageType {
	fn from_id(id: u64) -> Option<Self> {
		Some(match id {
			0 => Self::Welcome,
			1 => Self::Prefix,
			2 => Self::Call,
			3 => Self::CallResult,
			4 => Self::CallError,
			5 => Self::Subscribe,
			6 => Self::Unsubscribe,
			7 => Self::Publish,
			8 => Self::Event,
			_ => return None,
		})
	}
}

/// Error raised when a frame does not match any WAMP v1 layout.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DecodeError {
	#[error("message is not a JSON array")]
	NotAnArray,

	#[error("message is empty")]
	Empty,

	#[error("unknown message type: {0}")]
	UnknownType(Value),

	#[error("{kind:?} message missing or invalid field '{field}'")]
	InvalidField { kind: MessageType, field: &'static str },
}

/// A decoded WAMP v1 message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
	Welcome {
		session_id: String,
		protocol_version: u64,
		server_ident: String,
	},
	Prefix {
		prefix: String,
		uri: String,
	},
	Call {
		call_id: String,
		procedure: String,
		args: Vec<Value>,
	},
	CallResult {
		call_id: String,
		result: Value,
	},
	CallError {
		call_id: String,
		error_uri: String,
		description: String,
		details: Option<Value>,
	},
	Subscribe {
		topic: String,
	},
	Unsubscribe {
		topic: String,
	},
	Publish {
		topic: String,
		event: Value,
		exclude_me: Option<bool>,
	},
	Event {
		topic: String,
		event: Value,
	},
}

impl Message {
	/// Returns the numeric type of this message.
	pub fn kind(&self) -> MessageType {
		match self {
			Message::Welcome { .. } => MessageType::Welcome,
			Message::Prefix { .. } => MessageType::Prefix,
			Message::Call { .. } => MessageType::Call,
			Message::CallResult { .. } => MessageType::CallResult,
			Message::CallError { .. } => MessageType::CallError,
			Message::Subscribe { .. } => MessageType::Subscribe,
			Message::Unsubscribe { .. } => MessageType::Unsubscribe,
			Message::Publish { .. } => MessageType::Publish,
			Message::Event { .. } => MessageType::Event,
		}
	}

	/// Encodes the message as its JSON array form.
	pub fn to_value(&self) -> Value {
		let kind = Value::from(self.kind() as u8);
		let items = match self {
			Message::Welcome {
				session_id,
				protocol_version,
				server_ident,
			} => vec![
				kind,
				Value::from(session_id.as_str()),
				Value::from(*protocol_version),
				Value::from(server_ident.as_str()),
			],
			Message::Prefix { prefix, uri } => {
				vec![kind, Value::from(prefix.as_str()), Value::from(uri.as_str())]
			}
			Message::Call {
				call_id,
				procedure,
				args,
			} => {
				let mut items = Vec::with_capacity(3 + args.len());
				items.push(kind);
				items.push(Value::from(call_id.as_str()));
				items.push(Value::from(procedure.as_str()));
				items.extend(args.iter().cloned());
				items
			}
			Message::CallResult { call_id, result } => {
				vec![kind, Value::from(call_id.as_str()), result.clone()]
			}
			Message::CallError {
				call_id,
				error_uri,
				description,
				details,
			} => {
				let mut items = vec![
					kind,
					Value::from(call_id.as_str()),
					Value::from(error_uri.as_str()),
					Value::from(description.as_str()),
				];
				if let Some(details) = details {
					items.push(details.clone());
				}
				items
			}
			Message::Subscribe { topic } | Message::Unsubscribe { topic } => {
				vec![kind, Value::from(topic.as_str())]
			}
			Message::Publish {
				topic,
				event,
				exclude_me,
			} => {
				let mut items = vec![kind, Value::from(topic.as_str()), event.clone()];
				if let Some(exclude_me) = exclude_me {
					items.push(Value::from(*exclude_me));
				}
				items
			}
			Message::Event { topic, event } => vec![kind, Value::from(topic.as_str()), event.clone()],
		};
		Value::Array(items)
	}

	/// Decodes a JSON array into a message.
	pub fn from_value(value: Value) -> Result<Self, DecodeError> {
		let Value::Array(items) = value else {
			return Err(DecodeError::NotAnArray);
		};
		let mut items = items.into_iter();
		let type_id = items.next().ok_or(DecodeError::Empty)?;
		let kind = type_id
			.as_u64()
			.and_then(MessageType::from_id)
			.ok_or_else(|| DecodeError::UnknownType(type_id.clone()))?;

		let mut fields = Fields { kind, items };
		let message = match kind {
			MessageType::Welcome => Message::Welcome {
				session_id: fields.string("sessionId")?,
				protocol_version: fields.u64("protocolVersion")?,
				// Older servers omit the ident.
				server_ident: fields.optional_string().unwrap_or_default(),
			},
			MessageType::Prefix => Message::Prefix {
				prefix: fields.string("prefix")?,
				uri: fields.string("uri")?,
			},
			MessageType::Call => Message::Call {
				call_id: fields.string("callId")?,
				procedure: fields.string("procUri")?,
				args: fields.rest(),
			},
			MessageType::CallResult => Message::CallResult {
				call_id: fields.string("callId")?,
				result: fields.value().unwrap_or(Value::Null),
			},
			MessageType::CallError => Message::CallError {
				call_id: fields.string("callId")?,
				error_uri: fields.string("errorUri")?,
				description: fields.optional_string().unwrap_or_default(),
				details: fields.value(),
			},
			MessageType::Subscribe => Message::Subscribe {
				topic: fields.string("topicUri")?,
			},
			MessageType::Unsubscribe => Message::Unsubscribe {
				topic: fields.string("topicUri")?,
			},
			MessageType::Publish => Message::Publish {
				topic: fields.string("topicUri")?,
				event: fields.value().unwrap_or(Value::Null),
				exclude_me: fields.value().and_then(|v| v.as_bool()),
			},
			MessageType::Event => Message::Event {
				topic: fields.string("topicUri")?,
				event: fields.value().unwrap_or(Value::Null),
			},
		};
		Ok(message)
	}
}

struct Fields<I> {
	kind: MessageType,
	items: I,
}

impl<I: Iterator<Item = Value>> Fields<I> {
	fn value(&mut self) -> Option<Value> {
		self.items.next()
	}

	fn string(&mut self, field: &'static str) -> Result<String, DecodeError> {
		match self.items.next() {
			Some(Value::String(s)) => Ok(s),
			_ => Err(DecodeError::InvalidField { kind: self.kind, field }),
		}
	}

	fn optional_string(&mut self) -> Option<String> {
		match self.items.next() {
			Some(Value::String(s)) => Some(s),
			_ => None,
		}
	}

	fn u64(&mut self, field: &'static str) -> Result<u64, DecodeError> {
		self.items
			.next()
			.and_then(|v| v.as_u64())
			.ok_or(DecodeError::InvalidField { kind: self.kind, field })
	}

	fn rest(self) -> Vec<Value> {
		self.items.collect()
	}
}
