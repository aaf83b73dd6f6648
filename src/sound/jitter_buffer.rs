//! bounded packet store, kept in timestamp order
//!
//! The buffer is a fixed ring of slots.  The head slot always holds the packet
//! with the oldest timestamp, so when the ring is full the oldest packet can be
//! evicted without moving anything.
use std::fmt;

use crate::common::{
    packet::Packet,
    seq_tracker::{Timestamp, WrappingCounter},
};

/// what happened to a packet handed to [`JitterBuffer::insert`]
#[derive(Debug, PartialEq)]
pub enum Insertion {
    Inserted,
    /// inserted, and the oldest packet was pushed out to make room
    Evicted(Packet),
    /// a packet with the same sequence number is already buffered
    Duplicate,
    /// sequence order disagrees with the timestamp neighbours
    Inconsistent,
    /// full, and the packet is older than everything buffered
    Overflow,
}

impl Insertion {
    pub fn accepted(&self) -> bool {
        matches!(self, Insertion::Inserted | Insertion::Evicted(_))
    }
}

/// timestamp one past the last frame of the packet
pub fn packet_end(packet: &Packet) -> Timestamp {
    packet.timestamp().offset(packet.num_samples() as i64)
}

pub struct JitterBuffer {
    slots: Vec<Option<Packet>>,
    head: usize,
    count: usize,
}

impl JitterBuffer {
    pub fn build(max_packets: usize) -> JitterBuffer {
        let mut slots = Vec::with_capacity(max_packets.max(1));
        slots.resize_with(max_packets.max(1), || None);
        JitterBuffer {
            slots,
            head: 0,
            count: 0,
        }
    }
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
    pub fn len(&self) -> usize {
        self.count
    }
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
    pub fn is_full(&self) -> bool {
        self.count == self.slots.len()
    }
    fn index(&self, n: usize) -> usize {
        (self.head + n) % self.slots.len()
    }
    fn get(&self, n: usize) -> Option<&Packet> {
        if n >= self.count {
            return None;
        }
        self.slots[self.index(n)].as_ref()
    }
    /// packets oldest timestamp first
    pub fn iter(&self) -> impl Iterator<Item = &Packet> + '_ {
        (0..self.count).filter_map(move |n| self.slots[self.index(n)].as_ref())
    }
    pub fn oldest(&self) -> Option<&Packet> {
        self.get(0)
    }
    /// end of whichever buffered packet reaches furthest
    pub fn newest_end(&self) -> Option<Timestamp> {
        self.iter().map(packet_end).reduce(|a, b| if b.delta(a) > 0 { b } else { a })
    }
    pub fn pop_oldest(&mut self) -> Option<Packet> {
        if self.count == 0 {
            return None;
        }
        let packet = self.slots[self.head].take();
        self.head = (self.head + 1) % self.slots.len();
        self.count -= 1;
        packet
    }
    pub fn clear(&mut self) -> () {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.head = 0;
        self.count = 0;
    }
    /// keep only the packets the predicate likes, order is preserved
    pub fn retain(&mut self, mut keep: impl FnMut(&Packet) -> bool) -> usize {
        let mut kept = 0;
        for n in 0..self.count {
            let from = self.index(n);
            match self.slots[from].take() {
                Some(p) if keep(&p) => {
                    let to = self.index(kept);
                    self.slots[to] = Some(p);
                    kept += 1;
                }
                _ => (),
            }
        }
        let removed = self.count - kept;
        self.count = kept;
        removed
    }

    /// Place a packet in timestamp order.  This scans the whole buffer for a
    /// duplicate and shifts the tail to open a slot, so it is O(n) in the
    /// buffered packets.  Evicting the oldest to make room is O(1).
    pub fn insert(&mut self, packet: Packet) -> Insertion {
        if self.iter().any(|p| p.seq() == packet.seq()) {
            return Insertion::Duplicate;
        }
        // first slot whose timestamp is after the new one.  equal timestamps stay
        // in arrival order
        let ts = packet.timestamp();
        let pos = self
            .iter()
            .position(|p| p.timestamp().delta(ts) > 0)
            .unwrap_or(self.count);
        if pos > 0 {
            if let Some(prev) = self.get(pos - 1) {
                if prev.seq().delta(packet.seq()) > 0 {
                    return Insertion::Inconsistent;
                }
            }
        }
        if let Some(next) = self.get(pos) {
            if next.seq().delta(packet.seq()) < 0 {
                return Insertion::Inconsistent;
            }
        }
        let mut evicted = None;
        let mut pos = pos;
        if self.is_full() {
            if pos == 0 {
                return Insertion::Overflow;
            }
            evicted = self.pop_oldest();
            pos -= 1;
        }
        // open a hole at pos by shifting the tail right one slot
        let mut n = self.count;
        while n > pos {
            let from = self.index(n - 1);
            let to = self.index(n);
            self.slots[to] = self.slots[from].take();
            n -= 1;
        }
        let at = self.index(pos);
        self.slots[at] = Some(packet);
        self.count += 1;
        match evicted {
            Some(p) => Insertion::Evicted(p),
            None => Insertion::Inserted,
        }
    }
}

impl fmt::Display for JitterBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.oldest() {
            Some(p) => write!(
                f,
                "{{ len: {}, capacity: {}, oldest_ts: {} }}",
                self.count,
                self.capacity(),
                p.timestamp()
            ),
            None => write!(f, "{{ len: 0, capacity: {} }}", self.capacity()),
        }
    }
}
