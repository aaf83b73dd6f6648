//! udp socket marked for low delay
use socket2::{Domain, SockAddr, Socket, Type};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use super::box_error::BoxError;

/// IPTOS_LOWDELAY
pub const TOS_LOW_DELAY: u32 = 0x10;

/// bind a udp socket on all interfaces with the low delay TOS bit set.  port 0 picks any free port.
pub fn new(port: u16) -> Result<UdpSocket, BoxError> {
    let raw_sock = Socket::new(Domain::IPV4, Type::DGRAM, None)?;
    raw_sock.set_tos(TOS_LOW_DELAY)?;
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), port);
    raw_sock.bind(&SockAddr::from(addr))?;
    Ok(UdpSocket::from(raw_sock))
}
