use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use super::protocol::{MAX_PACKET_SIZE, Packet, PacketError};
use super::stats::{NetworkStats, PacketLossSimulation};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Packet(#[from] PacketError),
    #[error("packet of {0} bytes exceeds MTU")]
    PacketTooLarge(usize),
    #[error("not connected")]
    NotConnected,
    #[error("unknown client {0}")]
    UnknownClient(u32),
}

/// Non-blocking UDP socket speaking `Packet`s.
pub struct NetworkEndpoint {
    socket: UdpSocket,
    local_addr: SocketAddr,
    stats: NetworkStats,
    recv_buffer: [u8; MAX_PACKET_SIZE],
    packet_loss: PacketLossSimulation,
}

impl NetworkEndpoint {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;

        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            stats: NetworkStats::default(),
            recv_buffer: [0u8; MAX_PACKET_SIZE],
            packet_loss: PacketLossSimulation::default(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut NetworkStats {
        &mut self.stats
    }

    pub fn set_packet_loss(&mut self, simulation: PacketLossSimulation) {
        self.packet_loss = simulation;
    }

    pub fn send_to(&mut self, packet: &Packet, addr: SocketAddr) -> Result<usize, TransportError> {
        let data = packet.serialize()?;

        if data.len() > MAX_PACKET_SIZE {
            return Err(TransportError::PacketTooLarge(data.len()));
        }

        if self.packet_loss.should_drop() {
            self.stats.packets_lost += 1;
            log::trace!("Simulated loss of {} to {}", packet.payload.name(), addr);
            return Ok(0);
        }

        let bytes = self.socket.send_to(&data, addr)?;

        self.stats.packets_sent += 1;
        self.stats.bytes_sent += bytes as u64;

        Ok(bytes)
    }

    /// Drains the socket. Datagrams that fail validation are counted and
    /// dropped.
    pub fn receive(&mut self) -> Result<Vec<(Packet, SocketAddr)>, TransportError> {
        let mut packets = Vec::new();

        loop {
            match self.socket.recv_from(&mut self.recv_buffer) {
                Ok((size, addr)) => match Packet::deserialize(&self.recv_buffer[..size]) {
                    Ok(packet) => {
                        self.stats.packets_received += 1;
                        self.stats.bytes_received += size as u64;
                        packets.push((packet, addr));
                    }
                    Err(e) => {
                        self.stats.packets_rejected += 1;
                        log::debug!("Dropping datagram from {}: {}", addr, e);
                    }
                },
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                // Windows reports ICMP port unreachable from an earlier send here.
                Err(ref e) if e.kind() == io::ErrorKind::ConnectionReset => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(packets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::{PacketHeader, PacketType};
    use std::time::{Duration, Instant};

    fn drain_until_some(endpoint: &mut NetworkEndpoint) -> Vec<(Packet, SocketAddr)> {
        let start = Instant::now();
        while start.elapsed() < Duration::from_millis(500) {
            let received = endpoint.receive().unwrap();
            if !received.is_empty() {
                return received;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        Vec::new()
    }

    #[test]
    fn loopback_send_and_receive() {
        let mut a = NetworkEndpoint::bind("127.0.0.1:0").unwrap();
        let mut b = NetworkEndpoint::bind("127.0.0.1:0").unwrap();

        let packet = Packet::new(PacketHeader::new(1, 0, 0), PacketType::Heartbeat);
        a.send_to(&packet, b.local_addr()).unwrap();

        let received = drain_until_some(&mut b);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, packet);
        assert_eq!(received[0].1, a.local_addr());
        assert_eq!(a.stats().packets_sent, 1);
    }

    #[test]
    fn malformed_datagram_is_dropped() {
        let raw = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut endpoint = NetworkEndpoint::bind("127.0.0.1:0").unwrap();

        raw.send_to(&[1, 2, 3], endpoint.local_addr()).unwrap();
        let good = Packet::new(PacketHeader::new(1, 0, 0), PacketType::Heartbeat);
        raw.send_to(&good.serialize().unwrap(), endpoint.local_addr())
            .unwrap();

        let received = drain_until_some(&mut endpoint);
        assert_eq!(received.len(), 1);
        assert_eq!(endpoint.stats().packets_rejected, 1);
    }

    #[test]
    fn oversized_packet_is_refused() {
        let mut endpoint = NetworkEndpoint::bind("127.0.0.1:0").unwrap();
        let packet = Packet::new(
            PacketHeader::new(1, 0, 0),
            PacketType::Payload {
                reliable: false,
                reliable_sequence: 0,
                data: vec![0; MAX_PACKET_SIZE * 2],
            },
        );

        let result = endpoint.send_to(&packet, endpoint.local_addr());
        assert!(matches!(result, Err(TransportError::PacketTooLarge(_))));
    }
}
