//! one sender's stream: admission, jitter buffering and playback
//!
//! A session is created for each new source and rebuilds that source's audio on
//! the server timeline.  Packets are judged against two references, the next
//! expected sequence number and the playback cursor, and either land in the
//! jitter buffer or get dropped.  Every render round the session copies whatever
//! buffered audio covers the next window and moves the cursor on.
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;

use crate::{
    common::{
        config::ServerConfig,
        packet::{ChannelMask, Packet, SourceId},
        seq_tracker::{Seqnum, Timestamp, Tracker, WrappingCounter},
        stream_time_stat::StreamTimeStat,
    },
    sound::jitter_buffer::{packet_end, Insertion, JitterBuffer},
};

/// why a session stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ShutdownReason {
    SeqJump,
    TsJump,
    Timeout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SessionState {
    /// collecting packets until there is enough to cover the latency
    Buffering,
    Playing,
    /// lost sync with the sender, playing out what is buffered
    Draining(ShutdownReason),
    Terminated(ShutdownReason),
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        !matches!(self, SessionState::Terminated(_))
    }
}

/// outcome of handing a packet to [`Session::admit`]
#[derive(Debug, PartialEq)]
pub enum Admission {
    Accepted,
    /// accepted, the oldest buffered packet was dropped to make room
    Evicted,
    /// seq at or before what has been played, or audio entirely behind the cursor
    Late,
    Duplicate,
    Inconsistent,
    Overflow,
    SeqJump,
    TsJump,
    Terminated,
}

impl Admission {
    pub fn accepted(&self) -> bool {
        matches!(self, Admission::Accepted | Admission::Evicted)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub accepted: u64,
    pub late: u64,
    pub duplicates: u64,
    pub inconsistent: u64,
    pub overflows: u64,
    pub evictions: u64,
    pub jumps: u64,
    pub rounds_played: u64,
    pub rounds_silent: u64,
    pub depth: StreamTimeStat,
}

impl SessionStats {
    fn new() -> SessionStats {
        SessionStats {
            accepted: 0,
            late: 0,
            duplicates: 0,
            inconsistent: 0,
            overflows: 0,
            evictions: 0,
            jumps: 0,
            rounds_played: 0,
            rounds_silent: 0,
            depth: StreamTimeStat::build(50, 16.0),
        }
    }
}

pub struct Session {
    source: SourceId,
    state: SessionState,
    seq: Tracker<Seqnum>,       // reference is the next expected seq
    cursor: Tracker<Timestamp>, // reference is the playback cursor
    played_seq: Option<Seqnum>,
    idle_ticks: u32,
    was_playing: bool,
    buffer: JitterBuffer,
    channel_mask: ChannelMask,
    channels: Vec<u32>,
    timeout: u32,
    latency: u32,
    output: Vec<f32>,
    stats: SessionStats,
}

impl Session {
    pub fn new(source: SourceId, config: &ServerConfig) -> Session {
        Session {
            source,
            state: SessionState::Buffering,
            seq: Tracker::new(config.max_seq_jump as u64),
            cursor: Tracker::new(config.max_ts_jump as u64),
            played_seq: None,
            idle_ticks: 0,
            was_playing: false,
            buffer: JitterBuffer::build(config.max_packets),
            channel_mask: config.channels,
            channels: (0..32).filter(|c| config.channels & (1 << c) != 0).collect(),
            timeout: config.timeout,
            latency: config.latency,
            output: vec![],
            stats: SessionStats::new(),
        }
    }
    pub fn source(&self) -> SourceId {
        self.source
    }
    pub fn state(&self) -> SessionState {
        self.state
    }
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
    pub fn expected_seq(&self) -> Option<Seqnum> {
        self.seq.reference()
    }
    pub fn playback_cursor(&self) -> Option<Timestamp> {
        self.cursor.reference()
    }
    pub fn idle_ticks(&self) -> u32 {
        self.idle_ticks
    }
    fn has_started(&self) -> bool {
        matches!(self.state, SessionState::Playing | SessionState::Draining(_))
    }

    fn begin_drain(&mut self, reason: ShutdownReason) -> () {
        self.stats.jumps += 1;
        match self.state {
            SessionState::Buffering | SessionState::Playing => {
                warn!(
                    "session {} lost sync ({:?}), draining {} packets",
                    self.source,
                    reason,
                    self.buffer.len()
                );
                self.state = SessionState::Draining(reason);
            }
            _ => (),
        }
    }

    fn terminate(&mut self, reason: ShutdownReason) -> () {
        info!("session {} terminated: {:?}", self.source, reason);
        self.state = SessionState::Terminated(reason);
        self.buffer.clear();
    }

    /// decide what to do with a packet from this session's source
    pub fn admit(&mut self, packet: Packet) -> Admission {
        if !self.is_active() {
            return Admission::Terminated;
        }
        let seq = packet.seq();
        let seq_delta = match self.seq.delta(seq) {
            Some(d) => d,
            None => {
                // first packet sets both references
                self.seq.reset(seq);
                self.cursor.reset(packet.timestamp());
                0
            }
        };
        if self.seq.is_jump(seq) {
            self.begin_drain(ShutdownReason::SeqJump);
            return Admission::SeqJump;
        }
        if let Some(played) = self.played_seq {
            if seq.delta(played) <= 0 {
                self.stats.late += 1;
                debug!("session {} late seq {} (played {})", self.source, seq, played);
                return Admission::Late;
            }
        }
        if self.cursor.is_jump(packet.timestamp()) {
            self.begin_drain(ShutdownReason::TsJump);
            return Admission::TsJump;
        }
        if let Some(cursor) = self.cursor.reference() {
            if self.has_started() && packet_end(&packet).delta(cursor) <= 0 {
                self.stats.late += 1;
                debug!("session {} late ts {} (cursor {})", self.source, packet.timestamp(), cursor);
                return Admission::Late;
            }
        }
        let result = match self.buffer.insert(packet) {
            Insertion::Inserted => Admission::Accepted,
            Insertion::Evicted(old) => {
                self.stats.evictions += 1;
                debug!("session {} full, dropped seq {}", self.source, old.seq());
                Admission::Evicted
            }
            Insertion::Duplicate => {
                self.stats.duplicates += 1;
                return Admission::Duplicate;
            }
            Insertion::Inconsistent => {
                self.stats.inconsistent += 1;
                debug!("session {} seq {} out of place for its timestamp", self.source, seq);
                return Admission::Inconsistent;
            }
            Insertion::Overflow => {
                self.stats.overflows += 1;
                return Admission::Overflow;
            }
        };
        if seq_delta >= 0 {
            self.seq.reset(seq.offset(1));
        }
        if self.state == SessionState::Buffering {
            if let Some(oldest) = self.buffer.oldest() {
                self.cursor.reset(oldest.timestamp());
            }
        }
        self.idle_ticks = 0;
        self.stats.accepted += 1;
        result
    }

    /// Enough buffered past the cursor to start playing.  A full buffer counts
    /// too: eviction caps the span at max_packets worth of audio, which can be
    /// short of the latency when packets are small.
    fn primed(&self) -> bool {
        if self.buffer.is_full() {
            return true;
        }
        match (self.cursor.reference(), self.buffer.newest_end()) {
            (Some(cursor), Some(end)) => end.delta(cursor) > self.latency as i64,
            _ => false,
        }
    }

    /// Called once input for a tick has been taken in.  A draining session that
    /// has played everything and got nothing new terminates here, so it stays
    /// visible (and silent) until the next tick.
    pub fn end_of_input(&mut self) -> () {
        if let SessionState::Draining(reason) = self.state {
            if self.buffer.is_empty() {
                self.terminate(reason);
            }
        }
    }

    /// Produce the next read_bufsz frames of this session (interleaved over the
    /// server channels).  Silence when there is nothing to play.
    pub fn render(&mut self, read_bufsz: usize) -> &[f32] {
        self.output.clear();
        self.output.resize(read_bufsz * self.channels.len(), 0.0);
        match self.state {
            SessionState::Terminated(_) => return &self.output,
            _ if self.idle_ticks >= self.timeout => {
                self.terminate(ShutdownReason::Timeout);
                return &self.output;
            }
            SessionState::Buffering => {
                if !self.primed() {
                    self.stats.rounds_silent += 1;
                    self.account_idle(false);
                    return &self.output;
                }
                info!("session {} playing, {} packets buffered", self.source, self.buffer.len());
                self.state = SessionState::Playing;
            }
            _ => (),
        }
        let played = self.play(read_bufsz);
        if played {
            self.stats.rounds_played += 1;
        } else {
            self.stats.rounds_silent += 1;
        }
        self.account_idle(played);
        &self.output
    }

    fn play(&mut self, read_bufsz: usize) -> bool {
        let cursor = match self.cursor.reference() {
            Some(c) => c,
            None => return false,
        };
        if let Some(end) = self.buffer.newest_end() {
            self.stats.depth.add_sample(end.delta(cursor).max(0) as f64);
        }
        let nch = self.channels.len();
        let mut played = false;
        // ascending timestamp order, later packets overwrite overlaps
        for packet in self.buffer.iter() {
            let start = packet.timestamp().delta(cursor);
            let from = start.max(0);
            let to = (start + packet.num_samples() as i64).min(read_bufsz as i64);
            if from >= to {
                continue;
            }
            for pos in from..to {
                let frame = (pos - start) as usize;
                let out = &mut self.output[pos as usize * nch..(pos as usize + 1) * nch];
                for (slot, ch) in out.iter_mut().zip(self.channels.iter()) {
                    *slot = packet.sample(frame, *ch).unwrap_or(0.0);
                }
            }
            played = true;
            self.played_seq = match self.played_seq {
                Some(p) if p.delta(packet.seq()) >= 0 => Some(p),
                _ => Some(packet.seq()),
            };
        }
        self.cursor.advance(read_bufsz as i64);
        let next = cursor.offset(read_bufsz as i64);
        self.buffer.retain(|p| packet_end(p).delta(next) > 0);
        played
    }

    // the round right after the audio runs out is not counted
    fn account_idle(&mut self, played: bool) -> () {
        let was_playing = std::mem::replace(&mut self.was_playing, played);
        if played || was_playing {
            self.idle_ticks = 0;
            return;
        }
        self.idle_ticks += 1;
        if self.idle_ticks >= self.timeout {
            self.terminate(ShutdownReason::Timeout);
        }
    }

    pub fn get_status(&self) -> serde_json::Value {
        serde_json::json!({
            "source": self.source,
            "state": self.state,
            "mask": self.channel_mask,
            "expected_seq": self.seq.reference(),
            "cursor": self.cursor.reference(),
            "buffered": self.buffer.len(),
            "idle": self.idle_ticks,
            "stats": self.stats,
        })
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{{ source: {}, state: {:?}, seq: {}, cursor: {}, buffer: {}, idle: {} }}",
            self.source, self.state, self.seq, self.cursor, self.buffer, self.idle_ticks
        )
    }
}

#[cfg(test)]
mod test_session {
    use super::*;

    // 10 frames per packet, 4 frames per read, mono server
    fn config() -> ServerConfig {
        ServerConfig {
            channels: 0x1,
            timeout: 5,
            latency: 20,
            max_packets: 8,
            max_seq_jump: 10,
            max_ts_jump: 100,
            ..Default::default()
        }
    }
    fn source() -> SourceId {
        SourceId::new("10.1.1.1:4000".parse().unwrap(), 3)
    }
    fn pkt(seq: u16, ts: u32) -> Packet {
        let samples = (0..10).map(|n| (ts + n) as f32).collect();
        Packet::new(source(), seq, ts, 0x1, samples).unwrap()
    }
    fn prime(s: &mut Session) {
        for n in 0..3u16 {
            assert_eq!(s.admit(pkt(n, n as u32 * 10)), Admission::Accepted);
        }
    }

    #[test]
    fn build() {
        let s = Session::new(source(), &config());
        assert_eq!(s.state(), SessionState::Buffering);
        assert_eq!(s.expected_seq(), None);
        println!("session: {}", s);
    }
    #[test]
    fn waits_for_latency() {
        let mut s = Session::new(source(), &config());
        s.admit(pkt(0, 0));
        s.admit(pkt(1, 10));
        // 20 samples buffered is not more than the latency
        assert_eq!(s.render(4), &[0.0; 4]);
        assert_eq!(s.playback_cursor(), Some(0));
        s.admit(pkt(2, 20));
        assert_eq!(s.render(4), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(s.state(), SessionState::Playing);
        assert_eq!(s.playback_cursor(), Some(4));
    }
    #[test]
    fn plays_across_packets_and_gaps() {
        let mut s = Session::new(source(), &config());
        s.admit(pkt(0, 0));
        s.admit(pkt(1, 30));
        assert_eq!(s.render(8), &[0., 1., 2., 3., 4., 5., 6., 7.]);
        assert_eq!(s.render(8), &[8., 9., 0., 0., 0., 0., 0., 0.]);
        assert_eq!(s.render(8), &[0.0; 8]);
        assert_eq!(s.render(8), &[0., 0., 0., 0., 0., 0., 30., 31.]);
        assert_eq!(s.buffered(), 1);
    }
    #[test]
    fn missing_channel_is_zero() {
        let mut cfg = config();
        cfg.channels = 0x3;
        let mut s = Session::new(source(), &cfg);
        prime(&mut s);
        assert_eq!(s.render(2), &[0.0, 0.0, 1.0, 0.0]);
    }
    #[test]
    fn reorder_before_playback() {
        let mut s = Session::new(source(), &config());
        assert!(s.admit(pkt(2, 20)).accepted());
        assert!(s.admit(pkt(1, 10)).accepted());
        assert!(s.admit(pkt(0, 0)).accepted());
        assert_eq!(s.expected_seq(), Some(3));
        assert_eq!(s.playback_cursor(), Some(0));
        assert_eq!(s.render(4), &[0.0, 1.0, 2.0, 3.0]);
    }
    #[test]
    fn late_packets_dropped() {
        let mut s = Session::new(source(), &config());
        prime(&mut s);
        s.admit(pkt(4, 40));
        for _ in 0..10 {
            s.render(4);
        }
        assert!(s.is_active());
        // seq 3 never arrived and its audio is behind the cursor now
        assert_eq!(s.admit(pkt(3, 30)), Admission::Late);
        // seq 1 has been played
        assert_eq!(s.admit(pkt(1, 10)), Admission::Late);
        assert_eq!(s.stats().late, 2);
    }
    #[test]
    fn duplicate_dropped() {
        let mut s = Session::new(source(), &config());
        s.admit(pkt(0, 0));
        s.admit(pkt(1, 10));
        assert_eq!(s.admit(pkt(1, 10)), Admission::Duplicate);
        assert_eq!(s.buffered(), 2);
    }
    #[test]
    fn seq_jump_drains_then_terminates() {
        let mut s = Session::new(source(), &config());
        prime(&mut s);
        s.render(4);
        assert_eq!(s.admit(pkt(14, 30)), Admission::SeqJump);
        assert_eq!(s.state(), SessionState::Draining(ShutdownReason::SeqJump));
        // in order packets still land while draining
        assert_eq!(s.admit(pkt(3, 30)), Admission::Accepted);
        s.end_of_input();
        assert!(s.is_active());
        for _ in 0..9 {
            s.render(4);
        }
        assert_eq!(s.buffered(), 0);
        // played out, silent until the next batch of input shows nothing new
        assert_eq!(s.render(4), &[0.0; 4]);
        assert!(s.is_active());
        s.end_of_input();
        assert_eq!(s.state(), SessionState::Terminated(ShutdownReason::SeqJump));
        assert_eq!(s.admit(pkt(4, 40)), Admission::Terminated);
    }
    #[test]
    fn ts_jump_drains() {
        let mut s = Session::new(source(), &config());
        prime(&mut s);
        assert_eq!(s.admit(pkt(3, 131)), Admission::TsJump);
        assert_eq!(s.state(), SessionState::Draining(ShutdownReason::TsJump));
        // draining skips the latency wait
        assert_eq!(s.render(2), &[0.0, 1.0]);
    }
    #[test]
    fn overflow_evicts_oldest() {
        let mut s = Session::new(source(), &config());
        for n in 0..8u16 {
            s.admit(pkt(n, n as u32 * 10));
        }
        assert_eq!(s.admit(pkt(8, 80)), Admission::Evicted);
        // still buffering, so the cursor follows the oldest packet left
        assert_eq!(s.playback_cursor(), Some(10));
        assert_eq!(s.stats().evictions, 1);
    }
    #[test]
    fn idle_timeout() {
        let mut s = Session::new(source(), &config());
        s.admit(pkt(0, 0));
        for n in 1..5 {
            s.render(4);
            assert_eq!(s.idle_ticks(), n);
            assert!(s.is_active());
        }
        s.render(4);
        assert_eq!(s.state(), SessionState::Terminated(ShutdownReason::Timeout));
        assert_eq!(s.render(4), &[0.0; 4]);
    }
    #[test]
    fn idle_reset_by_packet() {
        let mut s = Session::new(source(), &config());
        s.admit(pkt(0, 0));
        for _ in 0..4 {
            s.render(4);
        }
        assert_eq!(s.idle_ticks(), 4);
        s.admit(pkt(1, 10));
        assert_eq!(s.idle_ticks(), 0);
        s.render(4);
        assert_eq!(s.idle_ticks(), 1);
        assert!(s.is_active());
        println!("status: {}", s.get_status());
    }
    #[test]
    fn idle_starts_after_the_last_audio() {
        let mut s = Session::new(source(), &config());
        prime(&mut s);
        for _ in 0..3 {
            s.render(10);
            assert_eq!(s.idle_ticks(), 0);
        }
        // first silent round is not counted
        assert_eq!(s.render(10), &[0.0; 10]);
        assert_eq!(s.idle_ticks(), 0);
        s.render(10);
        assert_eq!(s.idle_ticks(), 1);
    }
    #[test]
    fn full_buffer_starts_playback() {
        // max_packets worth of audio is less than the latency
        let mut cfg = config();
        cfg.latency = 200;
        cfg.max_packets = 4;
        let mut s = Session::new(source(), &cfg);
        prime(&mut s);
        assert_eq!(s.render(4), &[0.0; 4]);
        assert_eq!(s.state(), SessionState::Buffering);
        assert!(s.admit(pkt(3, 30)).accepted());
        assert_eq!(s.render(4), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(s.state(), SessionState::Playing);
    }
    #[test]
    fn full_buffer_keeps_playing_through_evictions() {
        let mut cfg = config();
        cfg.latency = 200;
        cfg.max_packets = 4;
        let mut s = Session::new(source(), &cfg);
        for n in 0..20u16 {
            s.admit(pkt(n, n as u32 * 10));
        }
        assert_eq!(s.buffered(), 4);
        assert_eq!(s.playback_cursor(), Some(160));
        assert_eq!(s.render(2), &[160.0, 161.0]);
        assert_eq!(s.stats().evictions, 16);
    }
}
