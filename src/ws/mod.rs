//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` pushes snapshot notifications
//! (`listings_updated`, `stakes_updated`, `pass_failed`) for the topics a
//! client subscribes to. Payloads carry counts only; clients fetch the
//! snapshot itself over REST.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
