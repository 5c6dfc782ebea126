use std::net::{SocketAddr, ToSocketAddrs};
use std::time::{Duration, Instant};

use super::connection::{Connection, ConnectionState, Reliability};
use super::endpoint::{NetworkEndpoint, TransportError};
use super::events::{AUTHORITY_CLIENT_ID, ClientId, DisconnectReason, TransportEvent};
use super::host::HEARTBEAT_INTERVAL;
use super::protocol::PacketType;
use super::stats::{NetworkStats, PacketLossSimulation, rand_u64};

const HANDSHAKE_RETRY: Duration = Duration::from_millis(250);

/// Peer side of the transport: one connection to the authority.
pub struct NetworkPeer {
    endpoint: NetworkEndpoint,
    connection: Option<Connection>,
    client_salt: u64,
    client_id: Option<ClientId>,
    connect_started: Option<Instant>,
    last_handshake_send: Instant,
    connect_timeout: Duration,
    timeout: Duration,
}

impl NetworkPeer {
    pub fn bind<A: ToSocketAddrs>(
        addr: A,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            endpoint: NetworkEndpoint::bind(addr)?,
            connection: None,
            client_salt: rand_u64(),
            client_id: None,
            connect_started: None,
            last_handshake_send: Instant::now(),
            connect_timeout,
            timeout,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    pub fn stats(&self) -> &NetworkStats {
        self.endpoint.stats()
    }

    pub fn set_packet_loss(&mut self, simulation: PacketLossSimulation) {
        self.endpoint.set_packet_loss(simulation);
    }

    pub fn state(&self) -> ConnectionState {
        self.connection
            .as_ref()
            .map_or(ConnectionState::Disconnected, |c| c.state)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Identifier the authority assigned during the handshake.
    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.connection.as_ref().map(|c| c.addr)
    }

    pub fn connect(&mut self, server_addr: SocketAddr) -> Result<(), TransportError> {
        log::info!("Connecting to {}", server_addr);

        self.client_salt = rand_u64();
        self.client_id = None;
        self.connection = Some(Connection::new(server_addr, 0, self.client_salt));
        self.connect_started = Some(Instant::now());

        self.send_connection_request()
    }

    pub fn send(&mut self, data: Vec<u8>, reliability: Reliability) -> Result<(), TransportError> {
        let conn = self
            .connection
            .as_mut()
            .filter(|c| c.is_connected())
            .ok_or(TransportError::NotConnected)?;

        let packet = conn.send_data(data, reliability);
        let addr = conn.addr;
        self.endpoint.send_to(&packet, addr)?;
        Ok(())
    }

    /// Tells the authority we are leaving and drops the connection at once.
    pub fn disconnect(&mut self) -> Result<(), TransportError> {
        let Some(mut conn) = self.connection.take() else {
            return Ok(());
        };
        self.client_id = None;
        self.connect_started = None;

        if conn.state != ConnectionState::Disconnected {
            conn.state = ConnectionState::Disconnecting;
            let packet = conn.send_packet(PacketType::Disconnect);
            self.endpoint.send_to(&packet, conn.addr)?;
            log::info!("Disconnected from {}", conn.addr);
        }
        Ok(())
    }

    pub fn poll(&mut self) -> Result<Vec<TransportEvent>, TransportError> {
        let mut events = Vec::new();

        for (packet, addr) in self.endpoint.receive()? {
            let Some(conn) = self.connection.as_mut() else {
                continue;
            };
            if addr != conn.addr {
                log::debug!("Ignoring packet from unexpected {}", addr);
                continue;
            }

            // these are acked already; a failed reply skips only itself
            for payload in conn.process_packet(packet) {
                if let Err(e) = self.handle_payload(payload, &mut events) {
                    log::warn!("Failed to answer authority: {}", e);
                }
            }
        }

        self.service_connection(&mut events);
        Ok(events)
    }

    fn handle_payload(
        &mut self,
        payload: PacketType,
        events: &mut Vec<TransportEvent>,
    ) -> Result<(), TransportError> {
        match payload {
            PacketType::ConnectionChallenge {
                server_salt,
                challenge,
            } => self.handle_challenge(server_salt, challenge)?,
            PacketType::ConnectionAccepted { client_id } => {
                let Some(conn) = self.connection.as_mut() else {
                    return Ok(());
                };
                if conn.state != ConnectionState::Connected {
                    conn.state = ConnectionState::Connected;
                    self.client_id = Some(client_id);
                    self.connect_started = None;
                    log::info!("Connected to {} as client {}", conn.addr, client_id);
                    events.push(TransportEvent::Connected {
                        client: AUTHORITY_CLIENT_ID,
                    });
                }
            }
            PacketType::ConnectionDenied { reason } => {
                log::warn!("Connection denied: {}", reason);
                self.reset();
                events.push(TransportEvent::Disconnected {
                    client: AUTHORITY_CLIENT_ID,
                    reason: DisconnectReason::Denied(reason),
                });
            }
            PacketType::Payload { data, .. } => {
                if self.is_connected() {
                    events.push(TransportEvent::Received {
                        client: AUTHORITY_CLIENT_ID,
                        data,
                    });
                }
            }
            PacketType::Disconnect => {
                log::info!("Disconnected by authority");
                let was_connected = self.is_connected();
                self.reset();
                if was_connected {
                    events.push(TransportEvent::Disconnected {
                        client: AUTHORITY_CLIENT_ID,
                        reason: DisconnectReason::Graceful,
                    });
                }
            }
            other => log::debug!("Ignoring {} from authority", other.name()),
        }
        Ok(())
    }

    fn handle_challenge(&mut self, server_salt: u64, challenge: u64) -> Result<(), TransportError> {
        let Some(conn) = self.connection.as_mut() else {
            return Ok(());
        };
        if conn.state == ConnectionState::Connected {
            return Ok(());
        }

        if challenge != self.client_salt ^ server_salt {
            log::warn!("Challenge mismatch from {}", conn.addr);
            return Ok(());
        }

        conn.server_salt = server_salt;
        conn.state = ConnectionState::ChallengeResponse;
        self.send_challenge_response()
    }

    fn send_connection_request(&mut self) -> Result<(), TransportError> {
        let Some(conn) = self.connection.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        let packet = conn.send_packet(PacketType::ConnectionRequest {
            client_salt: self.client_salt,
        });
        self.last_handshake_send = Instant::now();
        self.endpoint.send_to(&packet, conn.addr)?;
        Ok(())
    }

    fn send_challenge_response(&mut self) -> Result<(), TransportError> {
        let Some(conn) = self.connection.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        let packet = conn.send_packet(PacketType::ChallengeResponse {
            combined_salt: conn.combined_salt(),
        });
        self.last_handshake_send = Instant::now();
        self.endpoint.send_to(&packet, conn.addr)?;
        Ok(())
    }

    fn service_connection(&mut self, events: &mut Vec<TransportEvent>) {
        let Some(state) = self.connection.as_ref().map(|c| c.state) else {
            return;
        };

        match state {
            ConnectionState::Connecting | ConnectionState::ChallengeResponse => {
                if self
                    .connect_started
                    .is_some_and(|start| start.elapsed() > self.connect_timeout)
                {
                    log::warn!("Connection attempt timed out");
                    self.reset();
                    events.push(TransportEvent::Disconnected {
                        client: AUTHORITY_CLIENT_ID,
                        reason: DisconnectReason::Timeout,
                    });
                } else if self.last_handshake_send.elapsed() >= HANDSHAKE_RETRY {
                    let retried = if state == ConnectionState::Connecting {
                        self.send_connection_request()
                    } else {
                        self.send_challenge_response()
                    };
                    if let Err(e) = retried {
                        log::warn!("Handshake retry failed: {}", e);
                    }
                }
            }
            ConnectionState::Connected => {
                let Some(conn) = self.connection.as_mut() else {
                    return;
                };

                if conn.is_timed_out(self.timeout) {
                    log::warn!("Authority connection lost");
                    self.reset();
                    events.push(TransportEvent::Disconnected {
                        client: AUTHORITY_CLIENT_ID,
                        reason: DisconnectReason::Timeout,
                    });
                    return;
                }

                let mut outgoing = conn.collect_resends();
                self.endpoint.stats_mut().resends += outgoing.len() as u64;
                if outgoing.is_empty() && conn.idle_for() >= HEARTBEAT_INTERVAL {
                    outgoing.push(conn.send_packet(PacketType::Heartbeat));
                }

                let addr = conn.addr;
                for packet in outgoing {
                    if let Err(e) = self.endpoint.send_to(&packet, addr) {
                        log::warn!("Failed to send {} to {}: {}", packet.payload.name(), addr, e);
                    }
                }
            }
            ConnectionState::Disconnected | ConnectionState::Disconnecting => {}
        }
    }

    fn reset(&mut self) {
        self.connection = None;
        self.client_id = None;
        self.connect_started = None;
    }
}

impl Drop for NetworkPeer {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            log::debug!("Disconnect on drop failed: {}", e);
        }
    }
}
