//! Server network layer handling UDP communications and game loop coordination
//!
//! Three background tasks surround the single-threaded match loop: one reads
//! datagrams, one writes them, and one expires silent peers. The match loop
//! owns [`GameState`] outright and talks to the tasks over channels.

use crate::client_manager::ClientManager;
use crate::game::GameState;
use log::{debug, error, info, warn};
use shared::{decode_packet, encode_packet, Packet, StreamConfig, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

const STATS_INTERVAL_TICKS: u32 = 60;

/// Inputs to the match loop
#[derive(Debug)]
pub enum ServerEvent {
    Datagram { packet: Packet, addr: SocketAddr },
    Timeout { client_id: u32 },
    Shutdown,
}

/// Packets queued by the match loop for the writer task
#[derive(Debug)]
pub enum Outbound {
    To { addr: SocketAddr, packet: Packet },
    Broadcast { packet: Packet, exclude: Option<u32> },
}

/// Authoritative node coordinating peers and map streaming
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game_state: GameState,
    tick_duration: Duration,

    events_tx: mpsc::UnboundedSender<ServerEvent>,
    events_rx: mpsc::UnboundedReceiver<ServerEvent>,
    outbound_tx: mpsc::UnboundedSender<Outbound>,
    outbound_rx: Option<mpsc::UnboundedReceiver<Outbound>>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_clients: usize,
        config: StreamConfig,
        seed: Option<u64>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let game_state = GameState::new(config, seed)?;
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            game_state,
            tick_duration,
            events_tx,
            events_rx,
            outbound_tx,
            outbound_rx: Some(outbound_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Handle that stops [`Server::run`] when sent [`ServerEvent::Shutdown`]
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerEvent> {
        self.events_tx.clone()
    }

    /// Reads datagrams and forwards the decodable ones to the match loop
    fn spawn_reader(&self) {
        let socket = Arc::clone(&self.socket);
        let events = self.events_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_PACKET_SIZE];

            loop {
                let (len, addr) = match socket.recv_from(&mut buffer).await {
                    Ok(received) => received,
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        continue;
                    }
                };

                let packet = match decode_packet(&buffer[..len]) {
                    Ok(packet) => packet,
                    Err(e) => {
                        warn!("Dropping datagram from {}: {}", addr, e);
                        continue;
                    }
                };

                if events.send(ServerEvent::Datagram { packet, addr }).is_err() {
                    debug!("Match loop gone, reader stopping");
                    break;
                }
            }
        });
    }

    /// Encodes each queued packet once and writes it to every target
    fn spawn_writer(&mut self) {
        let Some(mut outbound) = self.outbound_rx.take() else {
            warn!("Writer task already running");
            return;
        };
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);

        tokio::spawn(async move {
            while let Some(message) = outbound.recv().await {
                let (packet, targets) = match message {
                    Outbound::To { addr, packet } => (packet, vec![addr]),
                    Outbound::Broadcast { packet, exclude } => {
                        let targets: Vec<SocketAddr> = clients
                            .read()
                            .await
                            .get_client_addrs()
                            .into_iter()
                            .filter(|(id, _)| Some(*id) != exclude)
                            .map(|(_, addr)| addr)
                            .collect();
                        (packet, targets)
                    }
                };

                let data = match encode_packet(&packet) {
                    Ok(data) => data,
                    Err(e) => {
                        error!("Refusing to send packet: {}", e);
                        continue;
                    }
                };

                for addr in targets {
                    if let Err(e) = socket.send_to(&data, addr).await {
                        error!("Failed to send packet to {}: {}", addr, e);
                    }
                }
            }
        });
    }

    /// Expires peers that went quiet for longer than the client timeout
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let events = self.events_tx.clone();

        tokio::spawn(async move {
            let mut every_second = interval(Duration::from_secs(1));

            loop {
                every_second.tick().await;
                let expired = clients.write().await.check_timeouts();

                for client_id in expired {
                    if events.send(ServerEvent::Timeout { client_id }).is_err() {
                        return;
                    }
                }
            }
        });
    }

    fn queue(&self, message: Outbound) {
        if let Err(e) = self.outbound_tx.send(message) {
            error!("Writer task gone, dropping packet: {:?}", e.0);
        }
    }

    fn send_to(&self, addr: SocketAddr, packet: Packet) {
        self.queue(Outbound::To { addr, packet });
    }

    fn broadcast(&self, packet: Packet, exclude: Option<u32>) {
        self.queue(Outbound::Broadcast { packet, exclude });
    }

    async fn handle_connect(&mut self, client_version: u32, addr: SocketAddr) {
        info!("Client connecting from {} (version: {})", addr, client_version);

        if client_version != PROTOCOL_VERSION {
            self.send_to(
                addr,
                Packet::Disconnected {
                    reason: "Protocol version mismatch".to_string(),
                },
            );
            return;
        }

        let (replaced, joined) = {
            let mut clients = self.clients.write().await;
            let replaced = clients.find_client_by_addr(addr);
            if let Some(id) = replaced {
                clients.remove_client(&id);
            }
            (replaced, clients.add_client(addr))
        };

        if let Some(id) = replaced {
            info!("Removing existing client {} from {}", id, addr);
            self.game_state.remove_player(&id);
        }

        let Some(client_id) = joined else {
            self.send_to(
                addr,
                Packet::Disconnected {
                    reason: "Server full".to_string(),
                },
            );
            return;
        };

        self.game_state.add_player(client_id);
        self.send_to(addr, Packet::Connected { client_id });

        // Everyone else hears about objects created by this join through the
        // outbox; the joiner gets the whole live table, one object at a time.
        self.flush_replication(Some(client_id));
        let replay = self.game_state.join_packets();
        debug!("Replaying {} packets to client {}", replay.len(), client_id);
        for packet in replay {
            self.send_to(addr, packet);
        }
    }

    /// Processes incoming packets and updates game state
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                self.handle_connect(client_version, addr).await;
            }

            Packet::PlayerState { sequence, x, y } => {
                let accepted = {
                    let mut clients = self.clients.write().await;
                    clients
                        .find_client_by_addr(addr)
                        .and_then(|id| clients.record_state(id, sequence, x, y).map(|p| (id, p)))
                };

                if let Some((client_id, (x, y))) = accepted {
                    self.game_state.update_player_position(client_id, x, y);
                }
            }

            Packet::Contact {
                sequence,
                segment_id,
            } => {
                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients
                        .find_client_by_addr(addr)
                        .filter(|id| clients.record_contact(*id, sequence))
                };

                if let Some(client_id) = client_id {
                    self.game_state.handle_contact(client_id, segment_id);
                    self.flush_replication(None);
                }
            }

            Packet::Disconnect => {
                let removed = {
                    let mut clients = self.clients.write().await;
                    clients
                        .find_client_by_addr(addr)
                        .filter(|id| clients.remove_client(id))
                };

                if let Some(client_id) = removed {
                    self.game_state.remove_player(&client_id);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Broadcasts every queued create, setup and destroy in creation order
    fn flush_replication(&mut self, exclude: Option<u32>) {
        for packet in self.game_state.drain_replication() {
            self.broadcast(packet, exclude);
        }
    }

    /// Broadcasts the current window and players, chunked to fit datagrams
    async fn broadcast_world_state(&self) -> usize {
        let client_count = self.clients.read().await.len();
        if client_count == 0 {
            return 0;
        }

        for chunk in self.game_state.world_state(current_timestamp()) {
            self.broadcast(chunk, None);
        }
        client_count
    }

    /// Logs window health so a stalled frontier is visible to operators
    fn report_stream_stats(&self, client_count: usize) {
        let stats = self.game_state.stats();
        debug!(
            "Tick {}: {} clients, {} live segments, {} created, height {:.1}, {} failed spawns, {} replicated objects",
            self.game_state.tick,
            client_count,
            stats.live_segments,
            stats.segments_created,
            stats.cumulative_height,
            stats.failed_spawns,
            self.game_state.streamer().authority().object_count()
        );

        if stats.segments_created > 0 && !stats.frontier_can_grow {
            warn!(
                "Frontier cannot grow: {} live segments after {} created",
                stats.live_segments, stats.segments_created
            );
        }
    }

    async fn on_tick(&mut self) {
        self.game_state.tick += 1;
        self.flush_replication(None);
        let client_count = self.broadcast_world_state().await;

        if client_count > 0 && self.game_state.tick % STATS_INTERVAL_TICKS == 0 {
            self.report_stream_stats(client_count);
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_reader();
        self.spawn_writer();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);

        info!("Server started successfully");

        loop {
            tokio::select! {
                event = self.events_rx.recv() => match event {
                    Some(ServerEvent::Datagram { packet, addr }) => {
                        self.handle_packet(packet, addr).await;
                    }
                    Some(ServerEvent::Timeout { client_id }) => {
                        self.game_state.remove_player(&client_id);
                    }
                    Some(ServerEvent::Shutdown) | None => {
                        info!("Server shutting down");
                        break;
                    }
                },

                _ = tick_interval.tick() => self.on_tick().await,
            }
        }

        Ok(())
    }
}

fn current_timestamp() -> u64 {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis();
    (timestamp.min(u64::MAX as u128)) as u64
}
