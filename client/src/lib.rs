//! # Arena Client Library
//!
//! A headless client for the arena server. It mirrors the authoritative world
//! from reliable packets and position frames, moves its own player locally
//! with the same collision engine the server runs, and streams the player's
//! position back every frame.
//!
//! ## Module Organization
//!
//! ### Configuration (`config`)
//! Command line options: server address, player name, frame rate and the
//! fire and block cadences.
//!
//! ### Game Module (`game`)
//! [`game::ClientWorld`]: the mirrored entities and blocks, our own player,
//! local movement and interpolation.
//!
//! ### Input Module (`input`)
//! Scripted wandering input in place of a keyboard.
//!
//! ### Network Module (`network`)
//! TCP and UDP plumbing and the client loop.
//!
//! ## Usage Example
//!
//! ```no_run
//! use client::config::ClientConfig;
//! use client::network::Client;
//!
//! # async fn example() -> client::network::ClientResult<()> {
//! let mut client = Client::connect(&ClientConfig::default()).await?;
//! client.join().await?;
//! client.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod game;
pub mod input;
pub mod network;
