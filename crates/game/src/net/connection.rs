use std::collections::{BTreeMap, VecDeque};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use super::protocol::{Packet, PacketHeader, PacketType, sequence_greater_than};
use super::stats::rand_u64;
use super::tracking::{AckTracker, ReceiveTracker};

const MAX_TRACKED_PACKETS: usize = 256;
const REORDER_WINDOW: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    ChallengeResponse,
    Connected,
    Disconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reliability {
    Unreliable,
    /// Resent until acknowledged, delivered once and in send order.
    Reliable,
}

#[derive(Debug)]
struct ReliableMessage {
    reliable_sequence: u32,
    data: Vec<u8>,
    packet_sequences: Vec<u32>,
    last_sent: Instant,
}

/// Sequencing, acknowledgement and the reliable channel for one remote
/// address.
#[derive(Debug)]
pub struct Connection {
    pub addr: SocketAddr,
    pub client_id: u32,
    pub state: ConnectionState,
    pub client_salt: u64,
    pub server_salt: u64,
    send_sequence: u32,
    ack_tracker: AckTracker,
    receive_tracker: ReceiveTracker,
    next_reliable_out: u32,
    next_reliable_in: u32,
    unacked: VecDeque<ReliableMessage>,
    reorder: BTreeMap<u32, Vec<u8>>,
    last_receive_time: Instant,
    last_send_time: Instant,
    resends: u64,
}

impl Connection {
    pub fn new(addr: SocketAddr, client_id: u32, client_salt: u64) -> Self {
        let now = Instant::now();
        Self {
            addr,
            client_id,
            state: ConnectionState::Connecting,
            client_salt,
            server_salt: rand_u64(),
            send_sequence: 1,
            ack_tracker: AckTracker::new(MAX_TRACKED_PACKETS),
            receive_tracker: ReceiveTracker::new(),
            next_reliable_out: 1,
            next_reliable_in: 1,
            unacked: VecDeque::new(),
            reorder: BTreeMap::new(),
            last_receive_time: now,
            last_send_time: now,
            resends: 0,
        }
    }

    pub fn combined_salt(&self) -> u64 {
        self.client_salt ^ self.server_salt
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_receive_time.elapsed() > timeout
    }

    pub fn idle_for(&self) -> Duration {
        self.last_send_time.elapsed()
    }

    pub fn pending_reliable(&self) -> usize {
        self.unacked.len()
    }

    pub fn resends(&self) -> u64 {
        self.resends
    }

    /// Wraps `payload` in a header carrying our next sequence and the
    /// current acknowledgement state.
    pub fn send_packet(&mut self, payload: PacketType) -> Packet {
        let sequence = self.next_sequence();
        let (ack, ack_bitfield) = self.receive_tracker.ack_data();

        self.ack_tracker.track_packet(sequence);
        self.last_send_time = Instant::now();

        Packet::new(PacketHeader::new(sequence, ack, ack_bitfield), payload)
    }

    pub fn send_data(&mut self, data: Vec<u8>, reliability: Reliability) -> Packet {
        match reliability {
            Reliability::Unreliable => self.send_packet(PacketType::Payload {
                reliable: false,
                reliable_sequence: 0,
                data,
            }),
            Reliability::Reliable => {
                let reliable_sequence = self.next_reliable_out;
                self.next_reliable_out = self.next_reliable_out.wrapping_add(1);

                let packet = self.send_packet(PacketType::Payload {
                    reliable: true,
                    reliable_sequence,
                    data: data.clone(),
                });

                self.unacked.push_back(ReliableMessage {
                    reliable_sequence,
                    data,
                    packet_sequences: vec![packet.header.sequence],
                    last_sent: Instant::now(),
                });

                packet
            }
        }
    }

    /// Consumes an inbound packet and returns what is ready for the caller,
    /// in delivery order. Duplicate packets yield nothing; reliable payloads
    /// are held back until every earlier one has been delivered.
    pub fn process_packet(&mut self, packet: Packet) -> Vec<PacketType> {
        // Left unrecorded, so it stays unacked and the sender resends it
        // once the handshake completes.
        if !self.is_connected()
            && matches!(packet.payload, PacketType::Payload { reliable: true, .. })
        {
            log::debug!("Reliable payload from {} before connect, not acked", self.addr);
            return Vec::new();
        }

        if !self.receive_tracker.record_received(packet.header.sequence) {
            log::trace!(
                "Duplicate packet {} from {}",
                packet.header.sequence,
                self.addr
            );
            return Vec::new();
        }

        self.last_receive_time = Instant::now();

        let acked = self
            .ack_tracker
            .process_ack(packet.header.ack, packet.header.ack_bitfield);
        if !acked.is_empty() {
            self.unacked.retain(|msg| {
                !msg.packet_sequences
                    .iter()
                    .any(|seq| acked.contains(seq))
            });
        }

        match packet.payload {
            PacketType::Payload {
                reliable: true,
                reliable_sequence,
                data,
            } => self.accept_reliable(reliable_sequence, data),
            PacketType::Heartbeat => Vec::new(),
            other => vec![other],
        }
    }

    fn accept_reliable(&mut self, reliable_sequence: u32, data: Vec<u8>) -> Vec<PacketType> {
        if reliable_sequence != self.next_reliable_in
            && !sequence_greater_than(reliable_sequence, self.next_reliable_in)
        {
            return Vec::new();
        }

        if reliable_sequence.wrapping_sub(self.next_reliable_in) >= REORDER_WINDOW {
            log::debug!(
                "Reliable message {} from {} outside reorder window",
                reliable_sequence,
                self.addr
            );
            return Vec::new();
        }

        self.reorder.entry(reliable_sequence).or_insert(data);

        let mut ready = Vec::new();
        while let Some(data) = self.reorder.remove(&self.next_reliable_in) {
            ready.push(PacketType::Payload {
                reliable: true,
                reliable_sequence: self.next_reliable_in,
                data,
            });
            self.next_reliable_in = self.next_reliable_in.wrapping_add(1);
        }
        ready
    }

    /// Re-sends every reliable message whose retransmission timer expired.
    pub fn collect_resends(&mut self) -> Vec<Packet> {
        let rto = self.ack_tracker.rto();
        let due: Vec<(u32, Vec<u8>)> = self
            .unacked
            .iter()
            .filter(|msg| msg.last_sent.elapsed() >= rto)
            .map(|msg| (msg.reliable_sequence, msg.data.clone()))
            .collect();

        let mut packets = Vec::with_capacity(due.len());
        for (reliable_sequence, data) in due {
            let packet = self.send_packet(PacketType::Payload {
                reliable: true,
                reliable_sequence,
                data,
            });

            if let Some(msg) = self
                .unacked
                .iter_mut()
                .find(|msg| msg.reliable_sequence == reliable_sequence)
            {
                msg.packet_sequences.push(packet.header.sequence);
                msg.last_sent = Instant::now();
            }
            self.resends += 1;
            packets.push(packet);
        }
        packets
    }

    fn next_sequence(&mut self) -> u32 {
        let sequence = self.send_sequence;
        // Zero doubles as "nothing received yet" in ack headers.
        self.send_sequence = self.send_sequence.wrapping_add(1).max(1);
        sequence
    }
}
