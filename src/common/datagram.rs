//! raw datagrams as they come off the network, and the queue the server drains
use std::{fmt, net::SocketAddr, sync::mpsc};

#[cfg(test)]
use mockall::automock;

/// one datagram: who it was for, who sent it, and the bytes
#[derive(Clone, Debug, PartialEq)]
pub struct Datagram {
    pub dst: SocketAddr,
    pub src: SocketAddr,
    pub payload: Vec<u8>,
}

impl Datagram {
    pub fn new(dst: SocketAddr, src: SocketAddr, payload: &[u8]) -> Datagram {
        Datagram {
            dst,
            src,
            payload: payload.to_vec(),
        }
    }
}

impl fmt::Display for Datagram {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{{ dst: {}, src: {}, nbytes: {} }}",
            self.dst,
            self.src,
            self.payload.len()
        )
    }
}

/// Non-blocking source of datagrams.
///
/// read hands back whatever is pending, up to max.  It never waits.
#[cfg_attr(test, automock)]
pub trait DatagramReader {
    fn read(&mut self, max: usize) -> Vec<Datagram>;
}

/// the udp thread feeds the server through one of these
impl DatagramReader for mpsc::Receiver<Datagram> {
    fn read(&mut self, max: usize) -> Vec<Datagram> {
        let mut datagrams = Vec::new();
        while datagrams.len() < max {
            match self.try_recv() {
                Ok(d) => datagrams.push(d),
                Err(_e) => break,
            }
        }
        datagrams
    }
}
