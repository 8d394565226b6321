//! Built-in processing nodes: gain, oscillators, and a sequential graph
//! that composes a fixed set of nodes into one.

pub mod gain;
pub mod graph;
pub mod oscillator;

pub use gain::Gain;
pub use graph::Graph;
pub use oscillator::{Oscillator, Waveform};
