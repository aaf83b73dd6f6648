//! RTP datagram carrying L16 audio
//!
//! This is what goes "on the wire" into the receiver.  The header is plain RTP
//! (RFC 3550) and the payload is 16 bit big endian linear PCM, interleaved
//! (RFC 3551 payload types 10 and 11).  Like the rest of the receiver it is
//! kept simple on purpose: one sample format, no codecs.
use byteorder::{ByteOrder, NetworkEndian};
use num::FromPrimitive;
use simple_error::bail;
use std::fmt;

use super::{
    box_error::BoxError,
    datagram::Datagram,
    packet::{ChannelMask, DecodeError, Packet, PacketParser, SourceId},
    seq_tracker::{Seqnum, Timestamp},
};

pub const RTP_BUF_SIZE: usize = 1500;
pub const RTP_HEADER_SIZE: usize = 12;
pub const RTP_VERSION: u8 = 2;

/// payload types we know how to turn into samples
#[derive(FromPrimitive, ToPrimitive, PartialEq, Debug, Clone, Copy)]
pub enum PayloadType {
    L16Stereo = 10,
    L16Mono = 11,
}

impl PayloadType {
    pub fn channel_mask(&self) -> ChannelMask {
        match self {
            PayloadType::L16Stereo => 0x3,
            PayloadType::L16Mono => 0x1,
        }
    }
    pub fn from_channel_mask(mask: ChannelMask) -> Option<PayloadType> {
        match mask {
            0x3 => Some(PayloadType::L16Stereo),
            0x1 => Some(PayloadType::L16Mono),
            _ => None,
        }
    }
}

/// the message that gets read/write on the udp socket
///
/// getters/setters make sure everything is network endian and packed tight.
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |V=2|P|X|  CC   |M|     PT      |       sequence number         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                           timestamp                           |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |           synchronization source (SSRC) identifier            |
// +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
#[derive(Clone)]
pub struct RtpMessage {
    buffer: [u8; RTP_BUF_SIZE],
    nbytes: usize,
}

impl RtpMessage {
    /// build an empty message (version 2, stereo)
    pub fn new() -> RtpMessage {
        let mut msg = RtpMessage {
            buffer: [0; RTP_BUF_SIZE],
            nbytes: RTP_HEADER_SIZE,
        };
        msg.buffer[0] = RTP_VERSION << 6;
        msg.set_payload_type(PayloadType::L16Stereo);
        msg
    }
    /// copy raw bytes off the network into a message
    pub fn from_bytes(data: &[u8]) -> Result<RtpMessage, DecodeError> {
        if data.len() < RTP_HEADER_SIZE {
            return Err(DecodeError::TooShort(data.len()));
        }
        if data.len() > RTP_BUF_SIZE {
            return Err(DecodeError::TooLong(data.len()));
        }
        let mut msg = RtpMessage {
            buffer: [0; RTP_BUF_SIZE],
            nbytes: data.len(),
        };
        msg.buffer[..data.len()].copy_from_slice(data);
        Ok(msg)
    }
    pub fn get_version(&self) -> u8 {
        self.buffer[0] >> 6
    }
    pub fn has_padding(&self) -> bool {
        self.buffer[0] & 0x20 != 0
    }
    pub fn has_extension(&self) -> bool {
        self.buffer[0] & 0x10 != 0
    }
    pub fn get_csrc_count(&self) -> usize {
        (self.buffer[0] & 0x0f) as usize
    }
    pub fn get_marker(&self) -> bool {
        self.buffer[1] & 0x80 != 0
    }
    pub fn set_marker(&mut self, m: bool) -> () {
        if m {
            self.buffer[1] |= 0x80;
        } else {
            self.buffer[1] &= 0x7f;
        }
    }
    pub fn get_payload_type(&self) -> u8 {
        self.buffer[1] & 0x7f
    }
    pub fn set_payload_type(&mut self, pt: PayloadType) -> () {
        self.buffer[1] = (self.buffer[1] & 0x80) | (pt as u8);
    }
    /// sender assigned sequence number (used to detect lost and out of seq packets)
    pub fn get_sequence_num(&self) -> Seqnum {
        NetworkEndian::read_u16(&self.buffer[2..4])
    }
    pub fn set_sequence_num(&mut self, seq: Seqnum) -> () {
        NetworkEndian::write_u16(&mut self.buffer[2..4], seq)
    }
    /// sample clock of the first frame in the payload
    pub fn get_timestamp(&self) -> Timestamp {
        NetworkEndian::read_u32(&self.buffer[4..8])
    }
    pub fn set_timestamp(&mut self, ts: Timestamp) -> () {
        NetworkEndian::write_u32(&mut self.buffer[4..8], ts)
    }
    pub fn get_ssrc(&self) -> u32 {
        NetworkEndian::read_u32(&self.buffer[8..12])
    }
    pub fn set_ssrc(&mut self, ssrc: u32) -> () {
        NetworkEndian::write_u32(&mut self.buffer[8..12], ssrc)
    }
    /// Get the slice of buffer that has some data
    pub fn get_send_buffer(&self) -> &[u8] {
        &self.buffer[0..self.nbytes]
    }
    pub fn get_nbytes(&self) -> usize {
        self.nbytes
    }
    /// size of the header including csrc list and extension
    pub fn header_size(&self) -> Result<usize, DecodeError> {
        let mut size = RTP_HEADER_SIZE + self.get_csrc_count() * 4;
        if self.has_extension() {
            if self.nbytes < size + 4 {
                return Err(DecodeError::TooShort(self.nbytes));
            }
            let ext_words = NetworkEndian::read_u16(&self.buffer[size + 2..size + 4]) as usize;
            size += 4 + ext_words * 4;
        }
        if size > self.nbytes {
            return Err(DecodeError::TooShort(self.nbytes));
        }
        Ok(size)
    }
    /// the audio bytes (header and padding stripped)
    pub fn get_payload(&self) -> Result<&[u8], DecodeError> {
        let start = self.header_size()?;
        let mut end = self.nbytes;
        if self.has_padding() {
            let pad = self.buffer[self.nbytes - 1] as usize;
            if pad == 0 || pad > end - start {
                return Err(DecodeError::BadPadding(pad));
            }
            end -= pad;
        }
        Ok(&self.buffer[start..end])
    }
    /// Encode interleaved audio into the payload
    ///
    /// coding is i16 big endian, full scale at +/- 1.0
    pub fn encode_audio(&mut self, samples: &[f32]) -> Result<usize, BoxError> {
        let mut idx = RTP_HEADER_SIZE;
        if idx + samples.len() * 2 > RTP_BUF_SIZE {
            bail!("{} samples will not fit in one datagram", samples.len());
        }
        for v in samples {
            NetworkEndian::write_i16(&mut self.buffer[idx..idx + 2], Self::convert_to_i16(*v));
            idx += 2;
        }
        self.nbytes = idx;
        Ok(idx)
    }
    fn convert_to_i16(v: f32) -> i16 {
        (v * 32768.0).round().clamp(-32768.0, 32767.0) as i16
    }
    /// decode the payload into interleaved f32
    pub fn decode_audio(&self) -> Result<Vec<f32>, DecodeError> {
        let payload = self.get_payload()?;
        if payload.len() % 2 != 0 {
            return Err(DecodeError::BadPayloadLength(payload.len()));
        }
        Ok(payload
            .chunks_exact(2)
            .map(|b| Self::convert_to_f32(NetworkEndian::read_i16(b)))
            .collect())
    }
    fn convert_to_f32(n: i16) -> f32 {
        n as f32 / 32768.0
    }
}

impl fmt::Display for RtpMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{{ seq: {}, ts: {}, ssrc: {:08x}, pt: {}, nbytes: {} }}",
            self.get_sequence_num(),
            self.get_timestamp(),
            self.get_ssrc(),
            self.get_payload_type(),
            self.nbytes
        )
    }
}

/// decode path for RTP/L16 ports
pub struct RtpParser {}

impl RtpParser {
    pub fn new() -> RtpParser {
        RtpParser {}
    }
}

impl PacketParser for RtpParser {
    fn decode(&self, datagram: &Datagram) -> Result<Packet, DecodeError> {
        let msg = RtpMessage::from_bytes(&datagram.payload)?;
        if msg.get_version() != RTP_VERSION {
            return Err(DecodeError::BadVersion(msg.get_version()));
        }
        let pt: PayloadType = match FromPrimitive::from_u8(msg.get_payload_type()) {
            Some(pt) => pt,
            None => return Err(DecodeError::UnknownPayloadType(msg.get_payload_type())),
        };
        let samples = msg.decode_audio()?;
        Packet::new(
            SourceId::new(datagram.src, msg.get_ssrc()),
            msg.get_sequence_num(),
            msg.get_timestamp(),
            pt.channel_mask(),
            samples,
        )
    }
}
