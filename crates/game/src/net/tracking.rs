use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::protocol::sequence_greater_than;

const MIN_RTO: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct PendingPacket {
    pub sequence: u32,
    pub send_time: Instant,
    pub acked: bool,
}

/// Sent-side bookkeeping: which of our packets the remote end acknowledged,
/// plus a smoothed round-trip estimate.
#[derive(Debug)]
pub struct AckTracker {
    pending: VecDeque<PendingPacket>,
    max_pending: usize,
    srtt: f32,
    rtt_var: f32,
}

impl AckTracker {
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(max_pending),
            max_pending: max_pending.max(1),
            srtt: 100.0,
            rtt_var: 50.0,
        }
    }

    pub fn track_packet(&mut self, sequence: u32) {
        while self.pending.len() >= self.max_pending {
            self.pending.pop_front();
        }

        self.pending.push_back(PendingPacket {
            sequence,
            send_time: Instant::now(),
            acked: false,
        });
    }

    /// Marks every tracked packet covered by `ack` and its bitfield. Bit `n`
    /// of the bitfield stands for sequence `ack - n - 1`.
    pub fn process_ack(&mut self, ack: u32, ack_bitfield: u32) -> Vec<u32> {
        let mut acked_sequences = Vec::new();
        let mut rtt_samples = Vec::new();
        let now = Instant::now();

        for pending in &mut self.pending {
            if pending.acked {
                continue;
            }

            let is_acked = if pending.sequence == ack {
                true
            } else if sequence_greater_than(ack, pending.sequence) {
                let diff = ack.wrapping_sub(pending.sequence);
                diff <= 32 && (ack_bitfield & (1 << (diff - 1))) != 0
            } else {
                false
            };

            if is_acked {
                pending.acked = true;
                acked_sequences.push(pending.sequence);
                rtt_samples.push(now.duration_since(pending.send_time).as_secs_f32() * 1000.0);
            }
        }

        for rtt in rtt_samples {
            self.update_rtt(rtt);
        }

        while self.pending.front().is_some_and(|p| p.acked) {
            self.pending.pop_front();
        }

        acked_sequences
    }

    fn update_rtt(&mut self, rtt: f32) {
        const ALPHA: f32 = 0.125;
        const BETA: f32 = 0.25;

        let diff = (rtt - self.srtt).abs();
        self.rtt_var = (1.0 - BETA) * self.rtt_var + BETA * diff;
        self.srtt = (1.0 - ALPHA) * self.srtt + ALPHA * rtt;
    }

    pub fn srtt(&self) -> f32 {
        self.srtt
    }

    /// Retransmission timeout, `srtt + 4 * rttvar` with a 50 ms floor.
    pub fn rto(&self) -> Duration {
        let ms = self.srtt + 4.0 * self.rtt_var;
        Duration::from_secs_f32(ms.max(0.0) / 1000.0).max(MIN_RTO)
    }

    pub fn unacked_count(&self) -> usize {
        self.pending.iter().filter(|p| !p.acked).count()
    }
}

/// Receive-side bookkeeping: newest sequence seen, a bitfield of the 32
/// before it, and a short history for duplicate rejection.
#[derive(Debug)]
pub struct ReceiveTracker {
    last_received: Option<u32>,
    received_bitfield: u32,
    recent_sequences: VecDeque<u32>,
    max_recent: usize,
}

impl Default for ReceiveTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveTracker {
    pub fn new() -> Self {
        Self {
            last_received: None,
            received_bitfield: 0,
            recent_sequences: VecDeque::with_capacity(128),
            max_recent: 128,
        }
    }

    /// Returns false for a duplicate.
    pub fn record_received(&mut self, sequence: u32) -> bool {
        if self.recent_sequences.contains(&sequence) {
            return false;
        }

        if self.recent_sequences.len() >= self.max_recent {
            self.recent_sequences.pop_front();
        }
        self.recent_sequences.push_back(sequence);

        let Some(last) = self.last_received else {
            self.last_received = Some(sequence);
            self.received_bitfield = 0;
            return true;
        };

        if sequence_greater_than(sequence, last) {
            let diff = sequence.wrapping_sub(last);
            self.received_bitfield = if diff <= 32 {
                self.received_bitfield.checked_shl(diff).unwrap_or(0) | (1 << (diff - 1))
            } else {
                0
            };
            self.last_received = Some(sequence);
        } else {
            let diff = last.wrapping_sub(sequence);
            if (1..=32).contains(&diff) {
                self.received_bitfield |= 1 << (diff - 1);
            }
        }

        true
    }

    /// `(ack, ack_bitfield)` for the next outgoing header, `(0, 0)` before
    /// anything arrived. Sequence zero is never sent.
    pub fn ack_data(&self) -> (u32, u32) {
        (self.last_received.unwrap_or(0), self.received_bitfield)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_order_sequences_fill_bitfield() {
        let mut tracker = ReceiveTracker::new();

        tracker.record_received(1);
        tracker.record_received(2);
        tracker.record_received(3);

        let (ack, bitfield) = tracker.ack_data();
        assert_eq!(ack, 3);
        assert_eq!(bitfield, 0b11);
    }

    #[test]
    fn out_of_order_sequences_fill_bitfield() {
        let mut tracker = ReceiveTracker::new();

        tracker.record_received(3);
        tracker.record_received(1);
        tracker.record_received(2);

        let (ack, bitfield) = tracker.ack_data();
        assert_eq!(ack, 3);
        assert_eq!(bitfield, 0b11);
    }

    #[test]
    fn gap_leaves_hole_in_bitfield() {
        let mut tracker = ReceiveTracker::new();

        tracker.record_received(1);
        tracker.record_received(4);

        let (ack, bitfield) = tracker.ack_data();
        assert_eq!(ack, 4);
        assert_eq!(bitfield, 0b100);
    }

    #[test]
    fn duplicates_are_detected() {
        let mut tracker = ReceiveTracker::new();

        assert!(tracker.record_received(1));
        assert!(!tracker.record_received(1));
        assert!(tracker.record_received(2));
    }

    #[test]
    fn ack_round_trip_between_trackers() {
        let mut sender = AckTracker::new(64);
        let mut receiver = ReceiveTracker::new();

        for seq in 1..=5 {
            sender.track_packet(seq);
        }
        for seq in [1, 2, 4, 5] {
            receiver.record_received(seq);
        }

        let (ack, bitfield) = receiver.ack_data();
        let mut acked = sender.process_ack(ack, bitfield);
        acked.sort();

        assert_eq!(acked, vec![1, 2, 4, 5]);
        assert_eq!(sender.unacked_count(), 1);
    }

    #[test]
    fn rtt_sample_moves_estimate() {
        let mut tracker = AckTracker::new(32);

        tracker.track_packet(1);
        std::thread::sleep(Duration::from_millis(10));
        tracker.process_ack(1, 0);

        assert!(tracker.srtt() < 100.0);
        assert!(tracker.rto() >= MIN_RTO);
    }
}
