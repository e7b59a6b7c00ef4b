//! NATS transport for Warfront domain events.
//!
//! [`NatsEventPublisher`] implements the engine's `EventPublisher` port.
//! Publishing never blocks a lifecycle operation: the JSON payload is
//! handed to a background task on the current Tokio runtime, and delivery
//! failures are only logged.
//!
//! # Modules
//!
//! - [`publisher`] -- The publisher and subject naming
//! - [`error`] -- Setup errors

pub mod error;
pub mod publisher;

pub use error::NatsError;
pub use publisher::NatsEventPublisher;
