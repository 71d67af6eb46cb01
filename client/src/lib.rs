//! # Peer Client Library
//!
//! This library provides a headless peer for the climbing arena. A peer is a
//! non-authoritative node: it mirrors the streamed map decided by the server,
//! simulates one climbing player, and reports that player's position and
//! contact onsets back to the authoritative node.
//!
//! ## Architecture Overview
//!
//! ### Same Code, Different Authority
//! The peer runs the same [`shared::MapStreamer`] as the server, behind a
//! [`game::MirrorAuthority`] that is never authoritative. Contact onsets pass
//! through the local streamer and change nothing; the segment id is forwarded
//! to the server, which makes the actual decision. A peer never spawns
//! speculatively and never clears a segment's growth flag.
//!
//! ### Replication Mirror
//! Creation, setup and destruction packets are applied as they arrive. Objects
//! whose creation is not followed by a segment setup, such as the elimination
//! zone, are kept apart from the window. The per-tick snapshot arrives in
//! chunks and replaces the mirrored window once all chunks of a tick are in,
//! so lost packets only delay convergence.
//!
//! ### Contact Detection
//! A [`shared::ContactTracker`] reports each segment once when the climber
//! enters its vertical span, and again only after the climber has left it.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Mirrored world state, the local climber and contact detection.
//!
//! ### Network Module (`network`)
//! UDP connection handling, report sequencing and the peer loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Climb at 4 units per second, reporting 20 times per second
//!     let mut client = Client::new("127.0.0.1:8080", 4.0, 20, 7).await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod network;
