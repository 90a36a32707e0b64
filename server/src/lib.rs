//! # Arena Server Library
//!
//! The authoritative side of the arena. The server owns the canonical world:
//! it simulates movement and collisions at a fixed tick, decides damage and
//! despawns, and pushes the results to every connected client.
//!
//! ## Transport
//!
//! Two channels run side by side:
//! - **TCP** carries reliable packets (joins, entity and block creation,
//!   updates and deletions), framed and bincode-encoded.
//! - **UDP** carries compact position frames. Clients send their own player's
//!   position; the server relays it to everyone else and broadcasts bulk
//!   frames with every entity that moved during a tick.
//!
//! ## Module Organization
//!
//! ### Client Manager (`client_manager`)
//! Connection registry: player bindings, learned UDP endpoints and the
//! per-connection outbound queues.
//!
//! ### Configuration (`config`)
//! Command line options for the server binary.
//!
//! ### Game (`game`)
//! The [`game::World`] and its tick: integrate, collide, apply damage, resolve,
//! then collect what changed.
//!
//! ### Network (`network`)
//! Socket tasks and the main loop that serializes all world access.
//!
//! ### Replication (`replication`)
//! Turns a tick's changes into chunked bulk position frames.

pub mod client_manager;
pub mod config;
pub mod game;
pub mod network;
pub mod replication;
