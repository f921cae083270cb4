//! LED-chain topology core: lay out addressable LED bars on a canvas, wire
//! them into a daisy chain from a power source, and map a live wire-ordered
//! color stream onto the right on-screen LEDs no matter how the bars were
//! moved, rotated or reversed.

pub mod config;
pub mod frame;
pub mod inventory;
pub mod layout;
pub mod model;
pub mod sequencer;
pub mod workspace;
