//! read datagrams off a udp socket and queue them for the server
//!
//! Blocking reads with a short timeout.  The thread ends when the queue's
//! receiving side goes away.
use crate::common::{box_error::BoxError, datagram::Datagram, rtp_packet::RTP_BUF_SIZE};
use log::{debug, info};
use std::{io::ErrorKind, net::UdpSocket, sync::mpsc, time::Duration};

pub fn run(sock: UdpSocket, tx: mpsc::Sender<Datagram>) -> Result<(), BoxError> {
    sock.set_read_timeout(Some(Duration::from_millis(100)))?;
    let local = sock.local_addr()?;
    info!("udp thread reading on {}", local);
    let mut buf = [0u8; RTP_BUF_SIZE];
    loop {
        match sock.recv_from(&mut buf) {
            Ok((amt, src)) => {
                if tx.send(Datagram::new(local, src, &buf[..amt])).is_err() {
                    info!("udp thread on {} done, server went away", local);
                    return Ok(());
                }
            }
            Err(e) => match e.kind() {
                ErrorKind::WouldBlock | ErrorKind::TimedOut => (),
                ErrorKind::ConnectionReset => {
                    // icmp port unreachable from an earlier send, not fatal for a reader
                    debug!("udp read on {}: {}", local, e);
                }
                _ => return Err(Box::new(e)),
            },
        }
    }
}
