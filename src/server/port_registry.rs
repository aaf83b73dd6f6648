//! which parser handles datagrams sent to which local address
use log::info;
use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use crate::common::packet::PacketParser;

pub struct PortRegistry {
    ports: HashMap<SocketAddr, Arc<dyn PacketParser>>,
}

impl PortRegistry {
    pub fn new() -> PortRegistry {
        PortRegistry {
            ports: HashMap::new(),
        }
    }
    /// register (or replace) the parser for a destination address
    pub fn add_port(&mut self, address: SocketAddr, parser: Arc<dyn PacketParser>) -> () {
        if self.ports.insert(address, parser).is_some() {
            info!("replaced parser on {}", address);
        } else {
            info!("listening for packets on {}", address);
        }
    }
    pub fn find(&self, address: &SocketAddr) -> Option<&Arc<dyn PacketParser>> {
        self.ports.get(address)
    }
    pub fn num_ports(&self) -> usize {
        self.ports.len()
    }
}

#[cfg(test)]
mod test_port_registry {
    use super::*;
    use crate::common::{
        datagram::Datagram,
        packet::{DecodeError, MockPacketParser},
    };

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }
    fn parser_failing_with(err: fn() -> DecodeError) -> Arc<dyn PacketParser> {
        let mut mock = MockPacketParser::new();
        mock.expect_decode().returning(move |_| Err(err()));
        Arc::new(mock)
    }

    #[test]
    fn add_and_find() {
        let mut reg = PortRegistry::new();
        assert!(reg.find(&addr(7000)).is_none());
        reg.add_port(addr(7000), parser_failing_with(|| DecodeError::Empty));
        assert_eq!(reg.num_ports(), 1);
        assert!(reg.find(&addr(7000)).is_some());
        assert!(reg.find(&addr(7001)).is_none());
    }
    #[test]
    fn replace_parser() {
        let mut reg = PortRegistry::new();
        reg.add_port(addr(7000), parser_failing_with(|| DecodeError::Empty));
        reg.add_port(addr(7000), parser_failing_with(|| DecodeError::BadVersion(0)));
        assert_eq!(reg.num_ports(), 1);
        let d = Datagram::new(addr(7000), addr(9), &[0]);
        let parser = reg.find(&addr(7000)).unwrap();
        assert_eq!(parser.decode(&d).err(), Some(DecodeError::BadVersion(0)));
    }
    #[test]
    fn shared_parser() {
        let mut reg = PortRegistry::new();
        let parser = parser_failing_with(|| DecodeError::Empty);
        reg.add_port(addr(7000), parser.clone());
        reg.add_port(addr(7002), parser.clone());
        assert_eq!(reg.num_ports(), 2);
        assert_eq!(Arc::strong_count(&parser), 3);
    }
}
