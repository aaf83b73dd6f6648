//! the receiver engine and the sessions it runs
pub mod audio_server;
pub mod mixer;
pub mod port_registry;
pub mod session;
pub mod session_table;
pub mod udp_thread;
