//! error type shared by everything that can fail in the receiver
//!
//! Send + Sync so results can cross from the tick thread back to whoever
//! spawned it.
pub type BoxError = std::boxed::Box<
    dyn std::error::Error // must implement Error to satisfy ?
        + std::marker::Send
        + std::marker::Sync,
>;
