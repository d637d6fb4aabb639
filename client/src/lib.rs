//! # Arena Client Library
//!
//! Client-side runtime for the multiplayer arena. It keeps a local view of
//! the match the server streams over a WebSocket, derives the camera and the
//! player colors from it, and turns keyboard edges into commands.
//!
//! ## Architecture Overview
//!
//! State and commands travel in opposite directions and never feed into each
//! other inside the core:
//!
//! ```text
//! server -> network -> session -> game -> colors / camera -> rendering
//! keyboard -> input -> network -> server
//! ```
//!
//! ### Single Owner
//! The [`session::Session`] owns every component. Transport tasks run on a
//! tokio runtime, but they only report into the session's event queue; the
//! frame loop drains that queue on its own thread, one event at a time.
//!
//! ### Partial Snapshots
//! Every snapshot replaces the roster, status and timer. The creator, spawn
//! count, map and bullets are kept from earlier snapshots when a snapshot
//! leaves them out.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! The connection manager: one WebSocket per session, bearer-token handshake,
//! fire-and-forget sends that are dropped while disconnected.
//!
//! ### Game Module (`game`)
//! The match state and the snapshot merge, plus the observer trait the
//! derived views subscribe through.
//!
//! ### Colors and Camera (`colors`, `camera`)
//! Identity colors keyed on the sorted id set, and the clamped camera offset.
//!
//! ### Input and Bindings (`input`, `bindings`)
//! Held-key tracking, the loading gate, and the persisted binding table.
//!
//! ### Lifecycle (`lifecycle`, `credentials`, `session`)
//! Views, the leave guard, the room code store, the route guard, and the
//! event loop that ties them together.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::ClientConfig;
//! use client::lifecycle::MemoryRoomStore;
//! use client::session::{Directive, Session};
//!
//! let runtime = tokio::runtime::Runtime::new()?;
//! let mut session = Session::new(
//!     ClientConfig::default(),
//!     runtime.handle().clone(),
//!     Box::new(MemoryRoomStore::new(Some("ROOM1"))),
//! );
//! session.start()?;
//!
//! loop {
//!     // Push key, viewport and close events here, then:
//!     if session.drain() != Directive::Continue {
//!         break;
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bindings;
pub mod camera;
pub mod colors;
pub mod config;
pub mod credentials;
pub mod error;
pub mod game;
pub mod input;
pub mod lifecycle;
pub mod network;
pub mod rendering;
pub mod session;
