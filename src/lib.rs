//! rtjam_receiver - real time audio receiver library
//!
//! Takes RTP audio from any number of senders, puts each stream back in order
//! on one timeline and mixes them into a gapless output.  [`server::audio_server::Server`]
//! is the engine; everything under [`common`] and [`sound`] is what it is built from
//! or plugs into.
extern crate json;
#[macro_use]
extern crate num_derive;

pub mod common;
pub mod server;
pub mod sound;
