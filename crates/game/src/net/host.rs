use std::collections::HashMap;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use super::connection::{Connection, ConnectionState, Reliability};
use super::endpoint::{NetworkEndpoint, TransportError};
use super::events::{ClientId, DisconnectReason, TransportEvent};
use super::protocol::{Packet, PacketHeader, PacketType};
use super::stats::{NetworkStats, PacketLossSimulation};

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(100);

/// Authority side of the transport: accepts peers through the challenge
/// handshake and exchanges payloads with all of them.
pub struct NetworkHost {
    endpoint: NetworkEndpoint,
    connections: HashMap<SocketAddr, Connection>,
    next_client_id: ClientId,
    max_clients: usize,
    timeout: Duration,
}

impl NetworkHost {
    pub fn bind<A: ToSocketAddrs>(
        addr: A,
        max_clients: usize,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let endpoint = NetworkEndpoint::bind(addr)?;
        log::info!("Listening on {}", endpoint.local_addr());

        Ok(Self {
            endpoint,
            connections: HashMap::new(),
            next_client_id: 1,
            max_clients,
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

    pub fn connected_clients(&self) -> Vec<ClientId> {
        let mut clients: Vec<_> = self
            .connections
            .values()
            .filter(|c| c.is_connected())
            .map(|c| c.client_id)
            .collect();
        clients.sort_unstable();
        clients
    }

    pub fn connected_count(&self) -> usize {
        self.connections.values().filter(|c| c.is_connected()).count()
    }

    /// Drains the socket, drives handshakes, resends and keepalives, and
    /// reports what happened since the last call.
    pub fn poll(&mut self) -> Result<Vec<TransportEvent>, TransportError> {
        let packets = self.endpoint.receive()?;
        Ok(self.process(packets))
    }

    /// A reply that cannot be sent is logged and the rest of the batch is
    /// still handled.
    fn process(&mut self, packets: Vec<(Packet, SocketAddr)>) -> Vec<TransportEvent> {
        let mut events = Vec::new();

        for (packet, addr) in packets {
            self.handle_packet(packet, addr, &mut events);
        }

        self.service_connections();
        self.expire_connections(&mut events);

        events
    }

    pub fn send(
        &mut self,
        client: ClientId,
        data: Vec<u8>,
        reliability: Reliability,
    ) -> Result<(), TransportError> {
        let conn = self
            .connections
            .values_mut()
            .find(|c| c.client_id == client && c.is_connected())
            .ok_or(TransportError::UnknownClient(client))?;

        let packet = conn.send_data(data, reliability);
        let addr = conn.addr;
        self.endpoint.send_to(&packet, addr)?;
        Ok(())
    }

    pub fn broadcast(
        &mut self,
        data: &[u8],
        reliability: Reliability,
    ) -> Result<(), TransportError> {
        let mut outgoing = Vec::new();
        for conn in self.connections.values_mut().filter(|c| c.is_connected()) {
            outgoing.push((conn.send_data(data.to_vec(), reliability), conn.addr));
        }

        for (packet, addr) in outgoing {
            self.endpoint.send_to(&packet, addr)?;
        }
        Ok(())
    }

    pub fn disconnect(&mut self, client: ClientId) -> Result<(), TransportError> {
        let Some(addr) = self
            .connections
            .values()
            .find(|c| c.client_id == client)
            .map(|c| c.addr)
        else {
            return Err(TransportError::UnknownClient(client));
        };

        if let Some(mut conn) = self.connections.remove(&addr) {
            let packet = conn.send_packet(PacketType::Disconnect);
            self.endpoint.send_to(&packet, addr)?;
        }
        Ok(())
    }

    pub fn disconnect_all(&mut self) {
        let connections: Vec<_> = self.connections.drain().map(|(_, c)| c).collect();
        for mut conn in connections {
            if conn.is_connected() {
                let packet = conn.send_packet(PacketType::Disconnect);
                if let Err(e) = self.endpoint.send_to(&packet, conn.addr) {
                    log::warn!("Failed to notify {} of shutdown: {}", conn.addr, e);
                }
            }
        }
    }

    fn handle_packet(
        &mut self,
        packet: Packet,
        addr: SocketAddr,
        events: &mut Vec<TransportEvent>,
    ) {
        let Some(conn) = self.connections.get_mut(&addr) else {
            if let PacketType::ConnectionRequest { client_salt } = packet.payload
                && let Err(e) = self.handle_connection_request(addr, client_salt)
            {
                log::warn!("Failed to answer {}: {}", addr, e);
            }
            return;
        };

        for payload in conn.process_packet(packet) {
            let answered = match payload {
                PacketType::ConnectionRequest { .. } => self.send_challenge(addr),
                PacketType::ChallengeResponse { combined_salt } => {
                    self.handle_challenge_response(addr, combined_salt, events)
                }
                PacketType::Payload { data, .. } => {
                    if let Some(conn) = self.connections.get(&addr)
                        && conn.is_connected()
                    {
                        events.push(TransportEvent::Received {
                            client: conn.client_id,
                            data,
                        });
                    }
                    Ok(())
                }
                PacketType::Disconnect => {
                    if let Some(conn) = self.connections.remove(&addr) {
                        log::info!("Client {} ({}) disconnected", conn.client_id, addr);
                        if conn.is_connected() {
                            events.push(TransportEvent::Disconnected {
                                client: conn.client_id,
                                reason: DisconnectReason::Graceful,
                            });
                        }
                    }
                    Ok(())
                }
                other => {
                    log::debug!("Ignoring {} from {}", other.name(), addr);
                    Ok(())
                }
            };

            if let Err(e) = answered {
                log::warn!("Failed to answer {}: {}", addr, e);
            }
        }
    }

    fn handle_connection_request(
        &mut self,
        addr: SocketAddr,
        client_salt: u64,
    ) -> Result<(), TransportError> {
        if self.connections.len() >= self.max_clients {
            log::info!("Denying {}: server full", addr);
            let packet = Packet::new(
                PacketHeader::new(0, 0, 0),
                PacketType::ConnectionDenied {
                    reason: "Server full".to_string(),
                },
            );
            self.endpoint.send_to(&packet, addr)?;
            return Ok(());
        }

        let client_id = self.next_client_id;
        self.next_client_id = self.next_client_id.wrapping_add(1).max(1);

        log::debug!("Connection request from {} as client {}", addr, client_id);
        self.connections
            .insert(addr, Connection::new(addr, client_id, client_salt));
        self.send_challenge(addr)
    }

    fn send_challenge(&mut self, addr: SocketAddr) -> Result<(), TransportError> {
        let Some(conn) = self.connections.get_mut(&addr) else {
            return Ok(());
        };
        if conn.is_connected() {
            return Ok(());
        }

        let packet = conn.send_packet(PacketType::ConnectionChallenge {
            server_salt: conn.server_salt,
            challenge: conn.combined_salt(),
        });
        self.endpoint.send_to(&packet, addr)?;
        Ok(())
    }

    fn handle_challenge_response(
        &mut self,
        addr: SocketAddr,
        combined_salt: u64,
        events: &mut Vec<TransportEvent>,
    ) -> Result<(), TransportError> {
        let Some(conn) = self.connections.get_mut(&addr) else {
            return Ok(());
        };

        if combined_salt != conn.combined_salt() {
            log::warn!("Invalid challenge response from {}", addr);
            return Ok(());
        }

        // A repeated response means our accept was lost; answer again
        // without raising a second connect.
        if !conn.is_connected() {
            conn.state = ConnectionState::Connected;
            log::info!("Client {} connected from {}", conn.client_id, addr);
            events.push(TransportEvent::Connected {
                client: conn.client_id,
            });
        }

        let packet = conn.send_packet(PacketType::ConnectionAccepted {
            client_id: conn.client_id,
        });
        self.endpoint.send_to(&packet, addr)?;
        Ok(())
    }

    fn service_connections(&mut self) {
        let mut outgoing = Vec::new();

        for conn in self.connections.values_mut().filter(|c| c.is_connected()) {
            let resends = conn.collect_resends();
            self.endpoint.stats_mut().resends += resends.len() as u64;
            outgoing.extend(resends.into_iter().map(|p| (p, conn.addr)));

            if conn.idle_for() >= HEARTBEAT_INTERVAL {
                outgoing.push((conn.send_packet(PacketType::Heartbeat), conn.addr));
            }
        }

        for (packet, addr) in outgoing {
            if let Err(e) = self.endpoint.send_to(&packet, addr) {
                log::warn!("Failed to send {} to {}: {}", packet.payload.name(), addr, e);
            }
        }
    }

    fn expire_connections(&mut self, events: &mut Vec<TransportEvent>) {
        let timeout = self.timeout;
        let expired: Vec<SocketAddr> = self
            .connections
            .values()
            .filter(|c| c.is_timed_out(timeout))
            .map(|c| c.addr)
            .collect();

        for addr in expired {
            if let Some(conn) = self.connections.remove(&addr) {
                log::info!("Client {} ({}) timed out", conn.client_id, addr);
                if conn.is_connected() {
                    events.push(TransportEvent::Disconnected {
                        client: conn.client_id,
                        reason: DisconnectReason::Timeout,
                    });
                }
            }
        }
    }
}

impl Drop for NetworkHost {
    fn drop(&mut self) {
        self.disconnect_all();
    }
}
