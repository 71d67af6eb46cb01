//! # Map Streaming Server Library
//!
//! This library provides the authoritative node of the climbing arena. It owns
//! the streamed map: which segments exist, where each one is placed, and when
//! the oldest ones are retired. Every peer mirrors the decisions made here
//! through replication packets.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Streaming
//! The server is the only node whose [`shared::NetworkAuthority`] reports
//! itself authoritative. Segment ids, placement heights, creations and
//! destructions are decided here and nowhere else, which keeps the id and
//! height sequences totally ordered no matter how many peers report contacts
//! in the same frame.
//!
//! ### Client Management
//! Handles the lifecycle of peer connections:
//! - Connection establishment and player assignment
//! - Position reports feeding the player ranking
//! - Contact reports driving segment growth and retirement
//! - Disconnection and timeout cleanup
//!
//! ### Replication
//! Every creation, segment setup and destruction is queued as a packet and
//! broadcast to all peers. A joining peer gets the live object table replayed
//! one object at a time. Every tick a world snapshot follows, split into
//! datagram-sized chunks, so peers that lost a packet converge on the same
//! window.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! All packets and ticks are processed sequentially by one loop, so the
//! streaming state never needs locking. The authority check in front of each
//! mutation is the only gate.
//!
//! ### UDP-Based Communication
//! Packets are bincode-encoded datagrams of at most `MAX_PACKET_SIZE` bytes;
//! larger ones are refused rather than sent truncated. Lost replication
//! packets are not retried; the per-tick snapshot repairs the peer's view
//! instead.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Connection tracking, report ordering and deduplication, timeouts.
//!
//! ### Game Module (`game`)
//! Match state: the map streamer, the player ranking and match setup (initial
//! window on the first join, elimination zone on the second).
//!
//! ### Replicator Module (`replicator`)
//! The authoritative implementation of the replication primitives, backed by
//! an object table and an outgoing packet queue.
//!
//! ### Network Module (`network`)
//! UDP socket tasks, packet handling and the tick loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use shared::StreamConfig;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         Duration::from_millis(33), // 30Hz snapshots
//!         16,
//!         StreamConfig::default(),
//!         None, // random archetype picks
//!     ).await?;
//!
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod network;
pub mod replicator;
