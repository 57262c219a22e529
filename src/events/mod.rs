//! Run lifecycle events: types and broadcast bus.
//!
//! Processors publish an [`Event`] for every lifecycle change of their run to an
//! optional [`Bus`]. Progress trackers subscribe to the bus; nothing in the engine
//! depends on anyone listening.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
