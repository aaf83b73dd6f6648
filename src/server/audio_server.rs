//! the receiver engine: pull datagrams, route them to sessions, mix the rounds
//!
//! A [`Server`] is driven entirely by [`Server::tick`].  Each tick first drains
//! what is waiting on the input, then renders the requested number of rounds.
//! Nothing inside runs on its own clock, so the caller decides the pace (a
//! sound card callback, a timer loop, or a test).
use log::{debug, trace};
use serde::Serialize;
use simple_error::bail;
use std::{fmt, net::SocketAddr, sync::Arc};

use super::{mixer::Mixer, port_registry::PortRegistry, session_table::SessionTable};
use crate::{
    common::{
        box_error::BoxError,
        config::ServerConfig,
        datagram::{Datagram, DatagramReader},
        packet::PacketParser,
    },
    sound::SampleWriter,
};

/// counters for everything the server threw away or did
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ServerStats {
    pub datagrams: u64,
    pub no_route: u64,
    pub decode_errors: u64,
    pub refused: u64,
    pub rejected: u64,
    pub sessions_created: u64,
    pub sessions_removed: u64,
    pub rounds: u64,
}

impl fmt::Display for ServerStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => Err(fmt::Error),
        }
    }
}

pub struct Server<R: DatagramReader, W: SampleWriter> {
    input: R,
    output: W,
    ports: PortRegistry,
    sessions: SessionTable,
    mixer: Mixer,
    clock: u64,
    stats: ServerStats,
}

impl<R: DatagramReader, W: SampleWriter> Server<R, W> {
    pub fn new(input: R, output: W, config: ServerConfig) -> Result<Server<R, W>, BoxError> {
        config.validate()?;
        Ok(Server {
            input,
            output,
            ports: PortRegistry::new(),
            sessions: SessionTable::new(&config),
            mixer: Mixer::new(config.channels),
            clock: 0,
            stats: ServerStats::default(),
        })
    }

    /// route datagrams sent to this address through the parser
    pub fn add_port(&mut self, address: SocketAddr, parser: Arc<dyn PacketParser>) -> () {
        self.ports.add_port(address, parser);
    }

    /// number of sessions still alive
    pub fn num_sessions(&self) -> usize {
        self.sessions.num_sessions()
    }

    /// samples (per channel) rendered since the server started
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Read up to max_datagrams off the input, then render num_reads rounds of
    /// read_bufsz frames each to the output.
    ///
    /// Bad or unwanted datagrams are counted and dropped.  The only error is the
    /// output refusing a round (or a zero read_bufsz).
    pub fn tick(&mut self, max_datagrams: usize, num_reads: usize, read_bufsz: usize) -> Result<(), BoxError> {
        if read_bufsz == 0 {
            bail!("read_bufsz must be at least one frame");
        }
        for datagram in self.input.read(max_datagrams) {
            self.route(datagram);
        }
        // drains that ran dry last tick and got nothing new end here
        for session in self.sessions.iter_mut() {
            session.end_of_input();
        }
        self.sessions.remove_terminated();
        for _ in 0..num_reads {
            self.mixer.begin(read_bufsz);
            for session in self.sessions.iter_mut() {
                self.mixer.add(session.render(read_bufsz));
            }
            trace!("round at {} mixed {} sessions", self.clock, self.mixer.sources());
            self.sessions.remove_terminated();
            self.output.write(self.mixer.frame())?;
            self.clock += read_bufsz as u64;
            self.stats.rounds += 1;
        }
        Ok(())
    }

    fn route(&mut self, datagram: Datagram) -> () {
        self.stats.datagrams += 1;
        let parser = match self.ports.find(&datagram.dst) {
            Some(p) => p,
            None => {
                self.stats.no_route += 1;
                trace!("no port for {}", datagram);
                return;
            }
        };
        let packet = match parser.decode(&datagram) {
            Ok(p) => p,
            Err(e) => {
                self.stats.decode_errors += 1;
                debug!("dropped {}: {}", datagram, e);
                return;
            }
        };
        match self.sessions.resolve_or_create(packet.source()) {
            Some(session) => {
                let result = session.admit(packet);
                if !result.accepted() {
                    self.stats.rejected += 1;
                    trace!("session {} rejected packet: {:?}", session.source(), result);
                }
            }
            None => {
                self.stats.refused += 1;
                debug!("no room for new session {}", packet.source());
            }
        }
    }

    /// stop the server and hand back the sink so it can be flushed
    pub fn into_output(self) -> W {
        self.output
    }

    pub fn get_stats(&self) -> ServerStats {
        let mut stats = self.stats.clone();
        stats.sessions_created = self.sessions.created();
        stats.sessions_removed = self.sessions.removed();
        stats
    }

    /// counters plus one entry per live session
    pub fn get_status(&self) -> serde_json::Value {
        serde_json::json!({
            "clock": self.clock,
            "stats": self.get_stats(),
            "sessions": self.sessions.get_status()["sessions"],
        })
    }
}

impl<R: DatagramReader, W: SampleWriter> fmt::Display for Server<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{{ clock: {}, ports: {}, sessions: {} }}",
            self.clock, self.ports.num_ports(), self.sessions
        )
    }
}
