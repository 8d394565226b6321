//! `loomline` drives an ALSA PCM playback stream through a memory-mapped
//! ring buffer and renders audio through a composable processing graph.
//!
//! Hardware/card enumeration, format probing, and any device-configuration
//! DSL are deliberately not part of this crate — see [`device`] for the
//! thin boundary it does own. Bring an already-opened, already-negotiated
//! device and `loomline` handles the realtime transfer loop and the node
//! graph that fills it.

extern crate alsa_sys as alsa;
extern crate libc;

/// Playback vs. capture direction of a PCM stream. `loomline` only drives
/// playback end to end, but [`pcm::Pcm::open`] accepts either.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Direction {
    Playback,
    Capture,
}

/// In case a requested hardware parameter value is unavailable, which
/// direction should ALSA search for the nearest available value?
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValueOr {
    Less = -1,
    Nearest = 0,
    Greater = 1,
}

pub mod error;
pub use error::Error;

pub mod pcm;
pub use pcm::Pcm;

pub mod device;
pub use device::{Prepare, PreparedDevice};

pub mod view;
pub use view::{AccessPattern, ChannelView, Sample};

pub mod descriptor;
pub use descriptor::AudioData;

pub mod node;
pub use node::{Node, NodeHandle, PrepareContext, ProcessContext, Status};

pub mod nodes;

pub mod playback;
pub use playback::{LoopError, PlaybackLoop, StopHandle};
