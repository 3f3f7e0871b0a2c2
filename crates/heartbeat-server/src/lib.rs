//! # heartbeat-server
//!
//! Robot-side status bridge. Clients connect over WebSocket, register with an
//! `INIT` command and may send diagnostic data, which is answered with the
//! measured latency to the middleware. Independently, a scheduler pushes the
//! robot's battery, CPU and RAM figures to the middleware at a fixed interval.
//!
//! - [`registry`]: connections that completed `INIT`
//! - [`handlers`]: control commands, diagnostic data, disconnects
//! - [`transport`]: WebSocket sessions and logical channels
//! - [`heartbeat`]: metrics collection and middleware delivery
//! - [`server`]: axum routes and task startup

#![deny(unsafe_code)]

pub mod config;
pub mod handlers;
pub mod health;
pub mod heartbeat;
pub mod probe;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod transport;

pub use config::ServerConfig;
pub use server::{Collaborators, HeartbeatServer};
