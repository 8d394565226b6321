//! The Audio Data Descriptor: the per-iteration bundle of "here is the
//! window you have, and here is everything you need to know about its
//! shape" that the playback loop hands to the node graph each time
//! through.

use crate::pcm::{Format, Frames};
use crate::view::{AccessPattern, ChannelView};

/// Describes one transfer window: the [`ChannelView`] into the mmap ring
/// plus the stream metadata a node needs to interpret it correctly.
/// Created fresh for every iteration of the playback loop — it borrows the
/// view and is not meant to outlive the iteration that produced it.
#[derive(Debug)]
pub struct AudioData<'a> {
    view: ChannelView<'a>,
    format: Format,
    sample_rate: u32,
}

impl<'a> AudioData<'a> {
    pub(crate) fn new(view: ChannelView<'a>, format: Format, sample_rate: u32) -> Self {
        AudioData { view, format, sample_rate }
    }

    pub fn view(&self) -> &ChannelView<'a> {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ChannelView<'a> {
        &mut self.view
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u32 {
        self.view.n_channels()
    }

    pub fn frames(&self) -> Frames {
        self.view.n_frames()
    }

    pub fn access_pattern(&self) -> AccessPattern {
        self.view.access_pattern()
    }
}
