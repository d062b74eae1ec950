// src/bus/mod.rs

//! Typed publish/subscribe used to decouple the scheduler from observers.
//!
//! - [`message_bus`] holds the bus and its single ordered dispatcher.
//! - [`messages`] defines the messages the scheduler publishes.

pub mod message_bus;
pub mod messages;

pub use message_bus::{Message, MessageBus, SubscriptionId};
pub use messages::{FlowFinished, TaskStateChanged};
