//! gymview client - Core Library
//!
//! Session store and live update pipeline for a reinforcement-learning
//! training backend: HTTP collaborators for session control, a reconnecting
//! WebSocket channel for step-level updates, and bounded rolling metrics
//! for visualization consumers.

pub mod api;
pub mod channel;
pub mod cli;
pub mod commands;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod settings;
pub mod store;
pub mod telemetry;

pub use error::ClientError;
pub use store::SessionStore;
