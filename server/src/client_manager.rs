//! Peer connection management for the authoritative node
//!
//! This module handles the server-side bookkeeping of connected peers:
//! - Peer connection lifecycle (connect, disconnect, timeout)
//! - Latest reported player position, with stale reports discarded
//! - Contact report sequencing so a retransmitted contact is applied once
//! - Capacity limits and address tracking
//!
//! Peers simulate their own player and report its position; the authoritative
//! node only ranks those positions and turns contact reports into world changes.

use log::info;
use shared::CLIENT_TIMEOUT_SECS;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Represents a connected peer and the state it last reported
///
/// Each client maintains:
/// - Connection metadata (ID, address, last activity)
/// - The most recent player position it reported
/// - The highest report sequences applied, for ordering and deduplication
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Highest position report sequence we've applied
    pub last_state_sequence: u32,
    /// Highest contact report sequence we've applied
    pub last_contact_sequence: u32,
    /// Reported player position (x, y)
    pub position: (f32, f32),
}

impl Client {
    /// Creates a new client with the given ID and network address
    ///
    /// The client starts at the origin with no applied reports and is
    /// marked as recently active.
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            last_state_sequence: 0,
            last_contact_sequence: 0,
            position: (0.0, 0.0),
        }
    }

    /// Applies a position report if it is newer than the last one
    ///
    /// UDP may reorder packets, so a report with a sequence at or below the
    /// last applied one is dropped. Returns true if the position changed.
    pub fn apply_state(&mut self, sequence: u32, x: f32, y: f32) -> bool {
        self.last_seen = Instant::now();
        if sequence <= self.last_state_sequence {
            return false;
        }
        self.last_state_sequence = sequence;
        self.position = (x, y);
        true
    }

    /// Accepts a contact report once per sequence number
    ///
    /// Contact onsets are rare and ordered on the peer, so any sequence at or
    /// below the last accepted one is a duplicate or a late retransmission.
    pub fn accept_contact(&mut self, sequence: u32) -> bool {
        self.last_seen = Instant::now();
        if sequence <= self.last_contact_sequence {
            return false;
        }
        self.last_contact_sequence = sequence;
        true
    }

    /// Checks if the client has exceeded the connection timeout
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected peers
///
/// The ClientManager enforces the server capacity limit, assigns client IDs
/// and keeps per-peer report ordering. Match setup is driven by
/// [`crate::game::GameState`], not by this table.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<u32, Client>,
    /// Next available client ID for new connections
    next_client_id: u32,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    /// Creates a new client manager with the specified capacity limit
    ///
    /// Client IDs start from 1 and increment for each new connection.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns Some(client_id) if successful, None if server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        let client = Client::new(client_id, addr);
        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, client);

        Some(client_id)
    }

    /// Removes a client from the server
    ///
    /// Returns true if the client was found and removed, false if they were
    /// already gone.
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    /// Finds a client ID by their network address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Records a position report for a client
    ///
    /// Returns the accepted position, or None if the client is unknown or the
    /// report is stale.
    pub fn record_state(
        &mut self,
        client_id: u32,
        sequence: u32,
        x: f32,
        y: f32,
    ) -> Option<(f32, f32)> {
        let client = self.clients.get_mut(&client_id)?;
        if client.apply_state(sequence, x, y) {
            Some(client.position)
        } else {
            None
        }
    }

    /// Records a contact report, returning false for unknown clients and duplicates
    pub fn record_contact(&mut self, client_id: u32, sequence: u32) -> bool {
        self.clients
            .get_mut(&client_id)
            .map(|client| client.accept_contact(sequence))
            .unwrap_or(false)
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the removed client IDs so other systems can drop their state.
    pub fn check_timeouts(&mut self) -> Vec<u32> {
        let timeout = Duration::from_secs(CLIENT_TIMEOUT_SECS);
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    /// Gets all client IDs and their network addresses for broadcasting
    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
