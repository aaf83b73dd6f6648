//! building blocks shared by the receiver engine, its collaborators and the demos
use std::time::{SystemTime, UNIX_EPOCH};

pub mod box_error;
pub mod config;
pub mod datagram;
pub mod packet;
pub mod rtp_packet;
pub mod seq_tracker;
pub mod sock_with_tos;
pub mod stream_time_stat;

/// wall clock in microseconds (only used for pacing and log stats, never for audio time)
pub fn get_micro_time() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros()
}
