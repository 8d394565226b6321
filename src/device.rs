//! The external-collaborator boundary: a minimal builder that negotiates
//! one interleaved (or noninterleaved) hardware/software parameter set and
//! freezes it into an opaque [`PreparedDevice`].
//!
//! This is deliberately not a general device-configuration DSL: no card
//! enumeration, no capability probing, no format negotiation beyond "pick
//! the one you asked for or fail". A consumer embedding `loomline` in a
//! larger application is expected to own that layer and either use
//! [`Prepare`] for the common case or hand-construct a [`PreparedDevice`]
//! from an already-opened [`Pcm`].

use crate::error::Result;
use crate::pcm::{Access, Format, Frames, Pcm};
use crate::view::AccessPattern;
use crate::Direction;
use std::ffi::CString;
use std::time::Duration;

/// A negotiated, ready-to-run PCM stream: the "D" of the component model.
/// Everything the playback loop needs to know about the stream's shape
/// lives here so the loop itself never has to re-query ALSA mid-run.
#[derive(Debug)]
pub struct PreparedDevice {
    pcm: Pcm,
    format: Format,
    channels: u32,
    rate: u32,
    buffer_size: Frames,
    period_size: Frames,
    timeout: Duration,
    access: AccessPattern,
}

impl PreparedDevice {
    pub fn pcm(&self) -> &Pcm {
        &self.pcm
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn buffer_size(&self) -> Frames {
        self.buffer_size
    }

    pub fn period_size(&self) -> Frames {
        self.period_size
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn access(&self) -> AccessPattern {
        self.access
    }

    /// Bytes per output frame across all channels, derived from the
    /// negotiated format and channel count.
    pub fn byte_rate(&self) -> usize {
        self.format.bytes_per_sample() * self.channels as usize
    }
}

/// Builds a [`PreparedDevice`] by opening one PCM and negotiating exactly
/// the parameters given, erroring out rather than silently falling back
/// if the hardware can't provide them.
#[derive(Debug, Clone)]
pub struct Prepare {
    device: String,
    format: Format,
    channels: u32,
    rate: u32,
    buffer_size: Frames,
    period_size: Frames,
    access: AccessPattern,
    timeout: Duration,
}

impl Default for Prepare {
    fn default() -> Self {
        Prepare {
            device: "default".to_string(),
            format: Format::S16LE,
            channels: 2,
            rate: 44_100,
            buffer_size: 4096,
            period_size: 1024,
            access: AccessPattern::Interleaved,
            timeout: Duration::from_millis(1000),
        }
    }
}

impl Prepare {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device(mut self, name: impl Into<String>) -> Self {
        self.device = name.into();
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn channels(mut self, channels: u32) -> Self {
        self.channels = channels;
        self
    }

    pub fn rate(mut self, rate: u32) -> Self {
        self.rate = rate;
        self
    }

    pub fn buffer_size(mut self, frames: Frames) -> Self {
        self.buffer_size = frames;
        self
    }

    pub fn period_size(mut self, frames: Frames) -> Self {
        self.period_size = frames;
        self
    }

    pub fn access(mut self, access: AccessPattern) -> Self {
        self.access = access;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Opens the named device for playback and negotiates the requested
    /// parameters, returning a [`PreparedDevice`] ready for the playback
    /// loop to drive.
    pub fn open(&self) -> Result<PreparedDevice> {
        let name = CString::new(self.device.as_str()).expect("device name must not contain NUL");
        let pcm = Pcm::open(&name, Direction::Playback, false)?;

        let hwp = crate::pcm::HwParams::any(&pcm)?;
        let access = match self.access {
            AccessPattern::Interleaved => Access::MMapInterleaved,
            AccessPattern::Planar => Access::MMapNonInterleaved,
        };
        hwp.set_access(access)?;
        hwp.set_format(self.format)?;
        hwp.set_channels(self.channels)?;
        hwp.set_rate(self.rate, crate::ValueOr::Nearest as i32)?;
        let period_size = hwp.set_period_size_near(self.period_size, crate::ValueOr::Nearest as i32)?;
        let buffer_size = hwp.set_buffer_size_near(self.buffer_size)?;
        pcm.hw_params(&hwp)?;

        let rate = hwp.get_rate()?;

        // Disable ALSA's own auto-start policy (threshold == buffer_size
        // means "only once the ring is completely full"): the playback
        // loop's own start gate decides when to call `snd_pcm_start`
        // explicitly, well before the ring could fill that far.
        let swp = pcm.sw_params_current()?;
        swp.set_start_threshold(buffer_size)?;
        swp.set_avail_min(period_size)?;
        pcm.sw_params(&swp)?;

        Ok(PreparedDevice {
            pcm,
            format: self.format,
            channels: self.channels,
            rate,
            buffer_size,
            period_size,
            timeout: self.timeout,
            access: self.access,
        })
    }
}
