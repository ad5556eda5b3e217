// NetSim: Packet-level network simulator and graph toolkit written in Rust
// Copyright (C) 2023-2024 The NetSim developers
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Rate-limited packet queues with bounded buffers.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::animator::AnimationTarget;
use crate::event::{ConsumerRef, EventConsumer, EventQueue, EventTime};
use crate::packet::{HandlerRef, Packet, PacketHandler};
use crate::stats::SummaryStats;
use crate::types::Bandwidth;

/// Statistics about a [`PacketQueue`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Number of bytes currently enqueued.
    pub queue_size_bytes: u64,
    /// Number of packets currently enqueued.
    pub queue_size_pkts: u64,
    /// Number of packets that entered the queue (dropped or not).
    pub pkts_seen: u64,
    /// Number of packets dropped.
    pub pkts_dropped: u64,
    /// Number of packets transmitted downstream.
    pub pkts_tx: u64,
    /// Number of bytes that entered the queue (dropped or not).
    pub bytes_seen: u64,
    /// Number of bytes dropped.
    pub bytes_dropped: u64,
    /// Number of bytes transmitted downstream.
    pub bytes_tx: u64,
}

/// When to drop an incoming packet. The variants form the closed family of
/// queue disciplines.
pub enum DropPolicy {
    /// Drop only when the packet does not fit the queue capacity.
    Tail,
    /// Additionally drop packets above a threshold with probability
    /// `(queued - threshold) / (capacity - threshold)`.
    Random {
        /// Dropping starts above this value.
        threshold_bytes: u64,
        /// Random source deciding each drop.
        rng: StdRng,
    },
}

/// A drain-rate limited queue with a byte capacity.
///
/// Packets that fit are enqueued; when a packet enters an idle queue, a
/// drain event is scheduled after the packet's service time
/// (`size * 8 / rate`). Each drain forwards the head packet downstream and,
/// if the queue is non-empty, arms the next drain. Rate changes take effect
/// for the next service-time computation; drain events that are already
/// scheduled are not rewritten.
pub struct PacketQueue {
    id: String,
    me: Weak<RefCell<PacketQueue>>,
    rate: Bandwidth,
    max_size_bytes: u64,
    policy: DropPolicy,
    other_end: Option<HandlerRef>,
    queue: VecDeque<(EventTime, Packet)>,
    stats: QueueStats,
    time_waiting: SummaryStats,
}

impl PacketQueue {
    /// Create a tail-drop FIFO queue.
    pub fn fifo(
        src: &str,
        dst: &str,
        rate: Bandwidth,
        max_size_bytes: u64,
    ) -> Rc<RefCell<PacketQueue>> {
        Self::with_policy(src, dst, rate, max_size_bytes, DropPolicy::Tail)
    }

    /// Create a random-drop queue. Packets above `threshold_bytes` are
    /// dropped with a probability growing linearly up to the capacity.
    pub fn random_drop(
        src: &str,
        dst: &str,
        rate: Bandwidth,
        max_size_bytes: u64,
        threshold_bytes: u64,
        seed: u64,
    ) -> Rc<RefCell<PacketQueue>> {
        Self::with_policy(
            src,
            dst,
            rate,
            max_size_bytes,
            DropPolicy::Random {
                threshold_bytes,
                rng: StdRng::seed_from_u64(seed),
            },
        )
    }

    fn with_policy(
        src: &str,
        dst: &str,
        rate: Bandwidth,
        max_size_bytes: u64,
        policy: DropPolicy,
    ) -> Rc<RefCell<PacketQueue>> {
        assert!(rate.bps() > 0, "queue rate must be positive");
        Rc::new_cyclic(|me| {
            RefCell::new(PacketQueue {
                id: format!("queue_{src}_{dst}"),
                me: me.clone(),
                rate,
                max_size_bytes,
                policy,
                other_end: None,
                queue: VecDeque::new(),
                stats: QueueStats::default(),
                time_waiting: SummaryStats::new(),
            })
        })
    }

    /// Connect this queue to a handler. All packets will be processed by the
    /// handler as they are dequeued.
    pub fn connect(&mut self, handler: HandlerRef) {
        self.other_end = Some(handler);
    }

    /// The statistics of this queue.
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    /// Summary of the time packets spent waiting in the queue, in
    /// nanoseconds.
    pub fn time_waiting(&self) -> &SummaryStats {
        &self.time_waiting
    }

    /// The current drain rate.
    pub fn rate(&self) -> Bandwidth {
        self.rate
    }

    /// Change the drain rate. Takes effect for the next service time.
    pub fn set_rate(&mut self, rate: Bandwidth) {
        assert!(rate.bps() > 0, "queue rate must be positive");
        self.rate = rate;
    }

    /// Time to serve one packet at the current rate.
    fn service_time(&self, pkt: &Packet, queue: &dyn EventQueue) -> EventTime {
        let bits = pkt.size_bytes() as u64 * 8;
        queue.time_from_duration(Duration::from_secs_f64(bits as f64 / self.rate.bps() as f64))
    }

    fn should_drop(&mut self, pkt_size_bytes: u64) -> bool {
        let queued = self.stats.queue_size_bytes;
        if queued + pkt_size_bytes > self.max_size_bytes {
            return true;
        }
        match &mut self.policy {
            DropPolicy::Tail => false,
            DropPolicy::Random {
                threshold_bytes,
                rng,
            } => {
                if queued <= *threshold_bytes {
                    false
                } else {
                    let prob = (queued - *threshold_bytes) as f64
                        / (self.max_size_bytes - *threshold_bytes) as f64;
                    rng.gen::<f64>() < prob
                }
            }
        }
    }

    fn self_ref(&self) -> ConsumerRef {
        self.me.upgrade().unwrap()
    }
}

impl PacketHandler for PacketQueue {
    fn handle_packet(&mut self, pkt: Packet, queue: &mut dyn EventQueue) {
        let size = pkt.size_bytes() as u64;
        self.stats.pkts_seen += 1;
        self.stats.bytes_seen += size;

        if self.should_drop(size) {
            self.stats.pkts_dropped += 1;
            self.stats.bytes_dropped += size;
            return;
        }

        let was_idle = self.queue.is_empty();
        if was_idle {
            let drain_in = self.service_time(&pkt, queue);
            queue.enqueue_in(drain_in, &self.self_ref());
        }
        self.stats.queue_size_bytes += size;
        self.stats.queue_size_pkts += 1;
        self.queue.push_back((queue.current_time(), pkt));
    }
}

impl EventConsumer for PacketQueue {
    fn id(&self) -> &str {
        &self.id
    }

    fn handle_event(&mut self, queue: &mut dyn EventQueue) {
        let (enqueued_at, pkt) = match self.queue.pop_front() {
            Some(entry) => entry,
            None => return,
        };
        let size = pkt.size_bytes() as u64;
        self.stats.queue_size_bytes -= size;
        self.stats.queue_size_pkts -= 1;
        self.stats.pkts_tx += 1;
        self.stats.bytes_tx += size;

        let waited = queue.current_time() - enqueued_at;
        self.time_waiting
            .add(queue.duration_from_time(waited).as_nanos() as f64);

        if let Some((_, next)) = self.queue.front() {
            let drain_in = self.service_time(next, queue);
            queue.enqueue_in(drain_in, &self.self_ref());
        }

        match &self.other_end {
            Some(handler) => handler.borrow_mut().handle_packet(pkt, queue),
            None => log::warn!("{}: no downstream handler, packet dropped", self.id),
        }
    }
}

impl AnimationTarget for PacketQueue {
    /// Applying an animated value to a queue changes its drain rate.
    fn apply_value(&mut self, value: f64) {
        self.set_rate(Bandwidth::from_bps(value.max(1.0) as u64));
    }
}

impl std::fmt::Debug for PacketQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketQueue")
            .field("id", &self.id)
            .field("rate", &self.rate)
            .field("max_size_bytes", &self.max_size_bytes)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for DropPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropPolicy::Tail => f.write_str("Tail"),
            DropPolicy::Random {
                threshold_bytes, ..
            } => f
                .debug_struct("Random")
                .field("threshold_bytes", threshold_bytes)
                .finish_non_exhaustive(),
        }
    }
}
