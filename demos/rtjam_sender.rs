use clap::Parser;
use log::{debug, info};
use rand::Rng;
use rtjam_receiver::{
    common::{
        box_error::BoxError,
        get_micro_time,
        rtp_packet::{PayloadType, RtpMessage},
        stream_time_stat::MicroTimer,
    },
    sound::wav_writer::read_wav,
};
use simple_error::bail;
use std::{
    net::UdpSocket,
    thread::sleep,
    time::Duration,
};

/// Send a wav file (or a test tone) as RTP audio, with optional network impairments
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// receiver host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// receiver port
    #[arg(short, long, default_value_t = 7891)]
    port: u16,

    /// stream identifier
    #[arg(long, default_value_t = 0x5eed)]
    ssrc: u32,

    /// seconds of tone to send when there is no input file
    #[arg(long, default_value_t = 5)]
    seconds: u32,

    /// stereo wav file to send
    #[arg(short, long)]
    in_file: Option<String>,

    /// frames per packet
    #[arg(long, default_value_t = 128)]
    frames: usize,

    /// percent of packets to drop
    #[arg(long, default_value_t = 0)]
    loss: u32,

    /// percent of packets to hold back and send after the next one
    #[arg(long, default_value_t = 0)]
    reorder: u32,

    /// percent of packets to send twice
    #[arg(long, default_value_t = 0)]
    duplicate: u32,
}

const SAMPLE_RATE: u32 = 48000;

fn tone(seconds: u32) -> Vec<f32> {
    let n = (seconds * SAMPLE_RATE) as usize;
    let mut samples = Vec::with_capacity(n * 2);
    for i in 0..n {
        let t = i as f32 / SAMPLE_RATE as f32;
        samples.push(0.25 * (2.0 * std::f32::consts::PI * 440.0 * t).sin());
        samples.push(0.25 * (2.0 * std::f32::consts::PI * 660.0 * t).sin());
    }
    samples
}

fn main() -> Result<(), BoxError> {
    env_logger::init();
    let args = Args::parse();

    let samples = match &args.in_file {
        Some(f) => {
            let (samples, rate, channels) = read_wav(f)?;
            if channels != 2 || rate != SAMPLE_RATE {
                bail!("{} must be 48k stereo, got {} channels at {}", f, channels, rate);
            }
            samples
        }
        None => tone(args.seconds),
    };

    let sock = UdpSocket::bind("0.0.0.0:0")?;
    let target = format!("{}:{}", args.host, args.port);
    info!("sending {} frames to {} as ssrc {:#x}", samples.len() / 2, target, args.ssrc);

    let mut rng = rand::thread_rng();
    let mut held: Option<RtpMessage> = None;
    let mut sent = 0u64;
    let mut dropped = 0u64;
    let mut timer = MicroTimer::new(get_micro_time(), args.frames as u128 * 1_000_000 / SAMPLE_RATE as u128);

    for (n, chunk) in samples.chunks(args.frames * 2).enumerate() {
        let mut msg = RtpMessage::new();
        msg.set_payload_type(PayloadType::L16Stereo);
        msg.set_sequence_num(n as u16);
        msg.set_timestamp((n * args.frames) as u32);
        msg.set_ssrc(args.ssrc);
        msg.set_marker(n == 0);
        msg.encode_audio(chunk)?;

        while !timer.expired(get_micro_time()) {
            sleep(Duration::from_micros(timer.remaining(get_micro_time()) as u64));
        }
        timer.advance();

        if rng.gen_range(0..100) < args.loss {
            dropped += 1;
            debug!("dropping seq {}", n);
            continue;
        }
        if held.is_none() && rng.gen_range(0..100) < args.reorder {
            held = Some(msg);
            continue;
        }
        sock.send_to(msg.get_send_buffer(), &target)?;
        sent += 1;
        if rng.gen_range(0..100) < args.duplicate {
            sock.send_to(msg.get_send_buffer(), &target)?;
            sent += 1;
        }
        if let Some(late) = held.take() {
            sock.send_to(late.get_send_buffer(), &target)?;
            sent += 1;
        }
    }
    if let Some(late) = held.take() {
        sock.send_to(late.get_send_buffer(), &target)?;
        sent += 1;
    }
    info!("sent {} datagrams, dropped {}", sent, dropped);
    Ok(())
}
