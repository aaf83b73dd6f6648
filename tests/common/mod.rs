//! helpers shared by the integration tests: a packet generator that feeds the
//! server input and a sample checker that drains its output
#![allow(dead_code)]
use rtjam_receiver::common::{
    datagram::Datagram,
    rtp_packet::{PayloadType, RtpMessage},
};
use std::{net::SocketAddr, sync::mpsc};

/// frames per render round
pub const READ_BUFSZ: usize = 16;
/// frames per packet
pub const PKT_SAMPLES: usize = READ_BUFSZ * 5;
/// session latency in samples
pub const LATENCY: usize = 640;
/// packets needed for a session to start playing
pub const NUM_PACKETS: usize = LATENCY / PKT_SAMPLES + 1;
pub const MAX_PACKETS: usize = 100;
pub const MAX_SESSIONS: usize = 10;
pub const MAX_SN_JUMP: u16 = 100;
pub const MAX_TS_JUMP: u32 = 48000;
/// ticks (of PKT_SAMPLES) without packets until a session goes away
pub const TIMEOUT_TICKS: usize = 20;
pub const CHANNEL_MASK: u32 = 0x3;
pub const NUM_CH: usize = 2;

pub const DST_PORT: u16 = 7891;
pub const SRC_PORT: u16 = 40000;

pub fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// sample k of channel ch.  every value sits on the i16 grid so it comes back
/// from the wire unchanged
pub fn sample_value(k: i64, ch: usize) -> f32 {
    (k.rem_euclid(500) + 1 + ch as i64 * 600) as f32 / 32768.0
}

/// one sender: where it sends from/to and where its stream is up to
#[derive(Clone)]
pub struct PacketStream {
    pub src: u16,
    pub dst: u16,
    pub ssrc: u32,
    pub sn: u16,
    pub ts: u32,
    pub value: i64,
}

impl PacketStream {
    pub fn new() -> PacketStream {
        PacketStream {
            src: SRC_PORT,
            dst: DST_PORT,
            ssrc: 0x5eed,
            sn: 0,
            ts: 0,
            value: 0,
        }
    }
    /// build the next packet without moving the stream on
    pub fn make(&self, n_samples: usize) -> Datagram {
        let mut samples = Vec::with_capacity(n_samples * NUM_CH);
        for n in 0..n_samples {
            for ch in 0..NUM_CH {
                samples.push(sample_value(self.value + n as i64, ch));
            }
        }
        let mut msg = RtpMessage::new();
        msg.set_payload_type(PayloadType::L16Stereo);
        msg.set_sequence_num(self.sn);
        msg.set_timestamp(self.ts);
        msg.set_ssrc(self.ssrc);
        msg.encode_audio(&samples).unwrap();
        self.make_raw(msg.get_send_buffer())
    }
    /// arbitrary bytes from this sender
    pub fn make_raw(&self, bytes: &[u8]) -> Datagram {
        Datagram::new(addr(self.dst), addr(self.src), bytes)
    }
    pub fn advance(&mut self, n_samples: usize) {
        self.sn = self.sn.wrapping_add(1);
        self.ts = self.ts.wrapping_add(n_samples as u32);
        self.value += n_samples as i64;
    }
    /// send n_packets in order, each n_samples long
    pub fn write(&mut self, input: &mpsc::Sender<Datagram>, n_packets: usize, n_samples: usize) {
        for _ in 0..n_packets {
            input.send(self.make(n_samples)).unwrap();
            self.advance(n_samples);
        }
    }
}

/// checks what comes out of the server against the PacketStream values
pub struct SampleStream {
    value: i64,
    sessions: usize,
}

impl SampleStream {
    pub fn new() -> SampleStream {
        SampleStream {
            value: 0,
            sessions: 1,
        }
    }
    /// number of identical streams summed together
    pub fn set_sessions(&mut self, n: usize) {
        self.sessions = n;
    }
    pub fn advance(&mut self, n_samples: usize) {
        self.value += n_samples as i64;
    }
    fn next_frame(output: &mpsc::Receiver<Vec<f32>>) -> Vec<f32> {
        let frame = output.try_recv().expect("server produced fewer rounds than expected");
        assert_eq!(frame.len(), READ_BUFSZ * NUM_CH);
        frame
    }
    /// n_samples of stream data, the stream moves on
    pub fn read(&mut self, output: &mpsc::Receiver<Vec<f32>>, n_samples: usize) {
        assert_eq!(n_samples % READ_BUFSZ, 0);
        for _ in 0..n_samples / READ_BUFSZ {
            let frame = Self::next_frame(output);
            for n in 0..READ_BUFSZ {
                for ch in 0..NUM_CH {
                    let expected = sample_value(self.value, ch) * self.sessions as f32;
                    assert_eq!(
                        frame[n * NUM_CH + ch],
                        expected,
                        "sample {} channel {}",
                        self.value,
                        ch
                    );
                }
                self.value += 1;
            }
        }
    }
    /// n_samples of silence, the stream stays put
    pub fn read_zeros(&mut self, output: &mpsc::Receiver<Vec<f32>>, n_samples: usize) {
        assert_eq!(n_samples % READ_BUFSZ, 0);
        for _ in 0..n_samples / READ_BUFSZ {
            let frame = Self::next_frame(output);
            assert!(
                frame.iter().all(|v| *v == 0.0),
                "expected silence near sample {}",
                self.value
            );
        }
    }
}
