//! decoded audio packet and the parser contract that produces them
//!
//! A [`Packet`] is what a [`PacketParser`] hands the server after it has taken
//! a raw datagram apart.  Once built it never changes.
use serde::Serialize;
use std::{error::Error, fmt, net::SocketAddr};

#[cfg(test)]
use mockall::automock;

use super::{
    datagram::Datagram,
    seq_tracker::{Seqnum, Timestamp},
};

/// bit per channel (bit 0 is the left channel)
pub type ChannelMask = u32;

pub fn num_channels(mask: ChannelMask) -> usize {
    mask.count_ones() as usize
}

/// position of a channel inside an interleaved frame for the given mask
pub fn channel_index(mask: ChannelMask, channel: u32) -> Option<usize> {
    if channel >= 32 || mask & (1 << channel) == 0 {
        return None;
    }
    Some((mask & ((1 << channel) - 1)).count_ones() as usize)
}

/// Who sent the packet.  Network address plus the RTP SSRC so two
/// streams from the same socket are kept apart.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct SourceId {
    pub address: SocketAddr,
    pub ssrc: u32,
}

impl SourceId {
    pub fn new(address: SocketAddr, ssrc: u32) -> SourceId {
        SourceId { address, ssrc }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{:08x}", self.address, self.ssrc)
    }
}

/// Reasons a datagram could not be turned into a packet
#[derive(Debug, PartialEq)]
pub enum DecodeError {
    TooShort(usize),
    TooLong(usize),
    BadVersion(u8),
    UnknownPayloadType(u8),
    BadPadding(usize),
    BadPayloadLength(usize),
    Empty,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeError::TooShort(n) => write!(f, "datagram too short ({} bytes)", n),
            DecodeError::TooLong(n) => write!(f, "datagram too long ({} bytes)", n),
            DecodeError::BadVersion(v) => write!(f, "unsupported rtp version {}", v),
            DecodeError::UnknownPayloadType(pt) => write!(f, "unknown payload type {}", pt),
            DecodeError::BadPadding(n) => write!(f, "padding of {} bytes overruns packet", n),
            DecodeError::BadPayloadLength(n) => {
                write!(f, "payload of {} bytes is not whole frames", n)
            }
            DecodeError::Empty => write!(f, "packet carries no samples"),
        }
    }
}

impl Error for DecodeError {}

/// Anything that can turn a datagram into a packet.
///
/// The server keeps these behind an `Arc` in the port registry so one parser can
/// serve several ports.
#[cfg_attr(test, automock)]
pub trait PacketParser: Send + Sync {
    fn decode(&self, datagram: &Datagram) -> Result<Packet, DecodeError>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    source: SourceId,
    seq: Seqnum,
    timestamp: Timestamp,
    channel_mask: ChannelMask,
    num_samples: usize,
    samples: Vec<f32>, // interleaved
}

impl Packet {
    /// build a packet.  samples are interleaved, one frame per timestamp tick
    pub fn new(
        source: SourceId,
        seq: Seqnum,
        timestamp: Timestamp,
        channel_mask: ChannelMask,
        samples: Vec<f32>,
    ) -> Result<Packet, DecodeError> {
        let nch = num_channels(channel_mask);
        if nch == 0 || samples.is_empty() {
            return Err(DecodeError::Empty);
        }
        if samples.len() % nch != 0 {
            return Err(DecodeError::BadPayloadLength(samples.len()));
        }
        Ok(Packet {
            source,
            seq,
            timestamp,
            channel_mask,
            num_samples: samples.len() / nch,
            samples,
        })
    }
    pub fn source(&self) -> SourceId {
        self.source
    }
    pub fn seq(&self) -> Seqnum {
        self.seq
    }
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
    pub fn channel_mask(&self) -> ChannelMask {
        self.channel_mask
    }
    /// number of frames (samples per channel)
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
    /// sample for a channel at a frame offset, None if this packet does not carry the channel
    pub fn sample(&self, frame: usize, channel: u32) -> Option<f32> {
        let idx = channel_index(self.channel_mask, channel)?;
        self.samples
            .get(frame * num_channels(self.channel_mask) + idx)
            .copied()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{{ src: {}, seq: {}, ts: {}, mask: {:#x}, samples: {} }}",
            self.source, self.seq, self.timestamp, self.channel_mask, self.num_samples
        )
    }
}
