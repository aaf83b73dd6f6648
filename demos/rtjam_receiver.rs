use clap::Parser;
use log::{error, info, warn};
use rtjam_receiver::{
    common::{
        box_error::BoxError, config::Config, config::ServerConfig, datagram::Datagram, get_micro_time,
        packet::num_channels, rtp_packet::RtpParser, sock_with_tos, stream_time_stat::MicroTimer,
    },
    server::{audio_server::Server, udp_thread},
    sound::wav_writer::WavWriter,
};
use std::{
    sync::{mpsc, Arc},
    thread::{self, sleep},
    time::Duration,
};
use thread_priority::{ThreadBuilder, ThreadPriority};

/// Receive RTP audio from any number of senders and mix it into a wav file
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// json settings file
    #[arg(short, long, default_value = "settings.json")]
    settings: String,

    /// udp port to listen on (overrides the settings file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Filename for the mixed output (overrides the settings file)
    #[arg(short, long)]
    out_file: Option<String>,

    /// how long to run, 0 runs until killed
    #[arg(long, default_value_t = 0)]
    seconds: u64,

    /// write the settings back out (defaults filled in) and exit
    #[arg(long, default_value_t = false)]
    save_settings: bool,
}

fn main() -> Result<(), BoxError> {
    env_logger::init();
    let args = Args::parse();

    let mut defaults = ServerConfig::json_defaults();
    defaults["port"] = 7891.into();
    defaults["read_bufsz"] = 128.into();
    defaults["sample_rate"] = 48000.into();
    defaults["out_file"] = "mix.wav".into();
    let mut config = Config::build(args.settings.clone(), defaults)?;

    let server_config = ServerConfig::from_config(&config)?;
    let port = match args.port {
        Some(p) => p as u32,
        None => config.get_u32_value("port", None)?,
    };
    let read_bufsz = config.get_u32_value("read_bufsz", None)? as usize;
    let sample_rate = config.get_u32_value("sample_rate", None)?;
    let out_file = match args.out_file {
        Some(f) => f,
        None => config.get_str_value("out_file", None)?,
    };
    info!("config: {}", server_config);

    if args.save_settings {
        config.set_value("port", port)?;
        config.set_value("read_bufsz", read_bufsz as u32)?;
        config.set_value("sample_rate", sample_rate)?;
        config.set_value("out_file", out_file.as_str())?;
        config.save_settings()?;
        println!("{}", config.dump());
        return Ok(());
    }

    let sock = sock_with_tos::new(port as u16)?;
    let local = sock.local_addr()?;
    let (packet_tx, packet_rx) = mpsc::channel::<Datagram>();
    let _udp_handle = thread::spawn(move || {
        if let Err(e) = udp_thread::run(sock, packet_tx) {
            error!("udp thread exited with error {}", e);
        }
    });

    let channels = num_channels(server_config.channels) as u16;
    let writer = WavWriter::create(&out_file, channels, sample_rate)?;
    let mut server = Server::new(packet_rx, writer, server_config)?;
    server.add_port(local, Arc::new(RtpParser::new()));

    let seconds = args.seconds;
    let builder = ThreadBuilder::default()
        .name("Real-Time Thread".to_string())
        .priority(ThreadPriority::Max);
    let handle = builder.spawn(move |_result| -> Result<(), BoxError> {
        let round_us = read_bufsz as u128 * 1_000_000 / sample_rate as u128;
        let start = get_micro_time();
        let mut round_timer = MicroTimer::new(start, round_us);
        let mut stats_timer = MicroTimer::new(start, 1_000_000);
        loop {
            let now = get_micro_time();
            if seconds > 0 && now - start >= seconds as u128 * 1_000_000 {
                break;
            }
            if round_timer.expired(now) {
                round_timer.advance();
                server.tick(1_000, 1, read_bufsz)?;
                if round_timer.expired(now) {
                    // fell more than a round behind, don't try to catch up
                    warn!("render late by {} us", round_timer.since(now));
                    round_timer.reset(now);
                }
            }
            if stats_timer.expired(now) {
                stats_timer.reset(now);
                info!("server: {} stats: {}", server, server.get_stats());
            }
            sleep(Duration::from_micros(round_timer.remaining(get_micro_time()).min(1_000) as u64));
        }
        info!("status: {}", server.get_status());
        let mut writer = server.into_output();
        info!("wrote {} frames", writer.frames());
        writer.finalize()
    })?;

    match handle.join() {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            error!("render thread exited with error {}", e);
            Err(e)
        }
        Err(_) => Err("render thread panicked".into()),
    }
}
