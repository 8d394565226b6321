//! Signal-generating nodes driven by a phase accumulator, written rather
//! than read from the window.

use crate::node::{AllocationError, Node, PrepareContext, ProcessContext};
use std::f32::consts::PI;

/// The waveform an [`Oscillator`] renders.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
}

/// A mono signal generator that fills every channel of each frame with the
/// same value (the common case for a tone source feeding a multichannel
/// output). Tracks its own phase across calls so consecutive windows join
/// without a discontinuity.
#[derive(Debug, Clone, Copy)]
pub struct Oscillator {
    waveform: Waveform,
    frequency: f32,
    amplitude: f32,
    initial_phase: f32,
    phase: f32,
    sample_rate: u32,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f32, amplitude: f32) -> Self {
        Self::with_phase(waveform, frequency, amplitude, 0.0)
    }

    /// Like [`Oscillator::new`], but starting (and resetting, on every
    /// `prepare`) at `phase` radians instead of 0 — e.g. `PI/2` lands the
    /// first frame of a sine on its peak rather than its zero-crossing.
    pub fn with_phase(waveform: Waveform, frequency: f32, amplitude: f32, phase: f32) -> Self {
        Oscillator { waveform, frequency, amplitude, initial_phase: phase, phase, sample_rate: 44_100 }
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency;
    }

    fn advance(&mut self) -> f32 {
        let two_pi = 2.0 * PI;
        let value = match self.waveform {
            Waveform::Sine => self.phase.sin(),
            Waveform::Square => {
                if self.phase.sin() >= 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
            // 2*(phi/2pi) - 1, wrapped to stay in [-1, 1).
            Waveform::Sawtooth => 2.0 * (self.phase / two_pi) - 1.0,
        };
        self.phase += two_pi * self.frequency / self.sample_rate as f32;
        if self.phase >= two_pi {
            self.phase -= two_pi;
        }
        value * self.amplitude
    }
}

impl Node for Oscillator {
    fn prepare(&mut self, ctx: &PrepareContext) -> Result<(), AllocationError> {
        self.sample_rate = ctx.sample_rate;
        self.phase = self.initial_phase;
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_, '_>) {
        let view = ctx.data.view_mut();
        let frames = view.n_frames();
        for frame in 0..frames {
            let value = self.advance();
            view.fill_frame(frame, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::AudioData;
    use crate::pcm::Format;
    use crate::view::ChannelView;

    fn ctx<'a, 'd>(data: &'a mut AudioData<'d>) -> ProcessContext<'a, 'd> {
        ProcessContext { data }
    }

    #[test]
    fn zero_frequency_is_constant_sine_at_zero_phase() {
        let mut bytes = vec![0u8; 4 * 1 * 4];
        let view = ChannelView::interleaved(&mut bytes, 1, 4, 4);
        let mut data = AudioData::new(view, Format::FloatLE, 44_100);
        let mut osc = Oscillator::new(Waveform::Sine, 0.0, 1.0);
        let prep = PrepareContext { sample_rate: 44_100, channels: 1, max_block_frames: 4, access_pattern: crate::view::AccessPattern::Interleaved };
        osc.prepare(&prep).unwrap();
        osc.process(&mut ctx(&mut data));
        for frame in 0..4 {
            assert_eq!(data.view().sample::<f32>(0, frame), 0.0);
        }
    }

    #[test]
    fn nyquist_sine_alternates_sign() {
        // sin(phase) is identically zero at every frame if phase starts at
        // 0 and advances by pi each frame (sin(k*pi) == 0 for all k). A
        // starting phase of pi/2 lands frame 0 on the peak instead, so the
        // alternation the spec describes is actually observable.
        let mut bytes = vec![0u8; 4 * 1 * 4];
        let view = ChannelView::interleaved(&mut bytes, 1, 4, 4);
        let mut data = AudioData::new(view, Format::FloatLE, 44_100);
        let mut osc = Oscillator::with_phase(Waveform::Sine, 22_050.0, 1.0, PI / 2.0);
        let prep = PrepareContext { sample_rate: 44_100, channels: 1, max_block_frames: 4, access_pattern: crate::view::AccessPattern::Interleaved };
        osc.prepare(&prep).unwrap();
        osc.process(&mut ctx(&mut data));
        for (frame, expected_sign) in [(0, 1.0), (1, -1.0), (2, 1.0), (3, -1.0)] {
            let sample = data.view().sample::<f32>(0, frame);
            assert!((sample.abs() - 1.0).abs() < 1e-3, "frame {frame}: expected amplitude ~1.0, got {sample}");
            assert!(sample * expected_sign > 0.0, "frame {frame}: expected sign {expected_sign}, got {sample}");
        }
    }

    #[test]
    fn sawtooth_spans_negative_one_to_positive_one() {
        let mut bytes = vec![0u8; 8 * 1 * 4];
        let view = ChannelView::interleaved(&mut bytes, 1, 8, 4);
        let mut data = AudioData::new(view, Format::FloatLE, 8);
        let mut osc = Oscillator::new(Waveform::Sawtooth, 1.0, 1.0);
        let prep = PrepareContext { sample_rate: 8, channels: 1, max_block_frames: 8, access_pattern: crate::view::AccessPattern::Interleaved };
        osc.prepare(&prep).unwrap();
        osc.process(&mut ctx(&mut data));
        assert_eq!(data.view().sample::<f32>(0, 0), -1.0);
    }
}
