//! Optional fan-out of UI events to NATS

pub mod bridge;
pub mod client;
pub mod messages;

pub use bridge::spawn_event_bridge;
pub use client::{event_subject, NatsClient, SUBJECT_PREFIX};
pub use messages::EventMessage;
