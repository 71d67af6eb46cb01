use crate::game::ClientGameState;
use log::{error, info, warn};
use shared::{decode_packet, encode_packet, Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::interval;

/// Headless peer: mirrors the streamed world and reports its climber to the server
pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    client_id: Option<u32>,
    connected: bool,

    game_state: ClientGameState,
    report_interval: Duration,
    state_sequence: u32,
    contact_sequence: u32,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        climb_speed: f32,
        report_rate: u32,
        seed: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            client_id: None,
            connected: false,
            game_state: ClientGameState::new(climb_speed, seed)?,
            report_interval: Duration::from_secs_f64(1.0 / report_rate.max(1) as f64),
            state_sequence: 0,
            contact_sequence: 0,
        })
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server...");

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = encode_packet(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected { client_id } => {
                info!("Connected! Client ID: {}", client_id);
                self.client_id = Some(client_id);
                self.connected = true;
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.client_id = None;
            }

            packet => {
                if !self.game_state.apply_server_packet(packet) {
                    warn!("Unexpected packet type");
                }
            }
        }
    }

    /// Advances the climber and reports its position and contact onsets
    async fn report(&mut self, dt: f32) -> Result<(), Box<dyn std::error::Error>> {
        let client_id = match self.client_id {
            Some(id) if self.connected => id,
            _ => return Ok(()),
        };

        let entered = self.game_state.step(client_id, dt);

        self.state_sequence += 1;
        let (x, y) = self.game_state.local_position;
        let state = Packet::PlayerState {
            sequence: self.state_sequence,
            x,
            y,
        };
        self.send_packet(&state).await?;

        for segment_id in entered {
            self.contact_sequence += 1;
            info!("Touched segment {}", segment_id);
            let contact = Packet::Contact {
                sequence: self.contact_sequence,
                segment_id,
            };
            self.send_packet(&contact).await?;
        }

        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn game_state(&self) -> &ClientGameState {
        &self.game_state
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut report_interval = interval(self.report_interval);
        let dt = self.report_interval.as_secs_f32();
        let mut buffer = [0u8; MAX_PACKET_SIZE];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            match decode_packet(&buffer[..len]) {
                                Ok(packet) => {
                                    let refused = matches!(packet, Packet::Disconnected { .. });
                                    self.handle_packet(packet).await;
                                    if refused {
                                        break;
                                    }
                                }
                                Err(e) => warn!("Dropping datagram from server: {}", e),
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = report_interval.tick() => {
                    if let Err(e) = self.report(dt).await {
                        error!("Error sending report: {}", e);
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, leaving match");
                    break;
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}
