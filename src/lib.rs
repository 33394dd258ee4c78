//! A bit-banged JTAG and SWD transport engine.
//!
//! This crate implements the wire-level state machines that sit between
//! an upper-layer debug-command queue and a lower-layer GPIO driver: the
//! 16-state JTAG TAP automaton and its scan/path/runtest operations
//! ([`jtag`]), and the SWD register read/write protocol with WAIT retry
//! and a sticky queued error ([`swd`]). Driving actual pins, building
//! scan buffers from higher-level debug operations, and any
//! configuration or command-line surface are all left to the caller;
//! see [`pin::PinDriver`] for the one trait a caller must implement.

pub mod bits;
pub mod error;
pub mod jtag;
pub mod pin;
pub mod swd;
pub mod tap;

#[cfg(test)]
mod test_support;

pub use error::Error;
pub use jtag::JtagEngine;
pub use pin::PinDriver;
pub use swd::SwdEngine;
pub use tap::TapState;
