//! Wire types for the Autobahn test-suite WAMP API.
//!
//! This crate contains the serde-serializable types exchanged with the
//! test-suite backend over WAMP v1. These types represent the "protocol
//! layer": the shapes of data as they appear on the wire.
//!
//! - [`message`]: WAMP v1 framing (`WELCOME`, `CALL`, `CALLRESULT`, ...)
//! - [`spec`]: test specifications as accepted by `testdb:importSpec`
//! - [`types`]: records returned by the `testdb` and `testrunner` procedures
//!
//! Higher-level ergonomic APIs are built on top of these types in `ab-client`.

pub mod message;
pub mod spec;
pub mod types;

pub use message::*;
pub use spec::*;
pub use types::*;
