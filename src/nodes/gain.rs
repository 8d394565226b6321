//! A node that scales every sample in the window by a fixed factor.

use crate::node::{AllocationError, Node, PrepareContext, ProcessContext};

/// Multiplies every sample by `gain` in place. `gain == 1.0` is the
/// identity: the window is left bit-for-bit as it came in.
#[derive(Debug, Clone, Copy)]
pub struct Gain {
    gain: f32,
}

impl Gain {
    pub fn new(gain: f32) -> Self {
        Gain { gain }
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }
}

impl Node for Gain {
    fn prepare(&mut self, _ctx: &PrepareContext) -> Result<(), AllocationError> {
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_, '_>) {
        let view = ctx.data.view_mut();
        let channels = view.n_channels() as usize;
        let frames = view.n_frames();
        for ch in 0..channels {
            for frame in 0..frames {
                let s: f32 = view.sample(ch, frame);
                view.set_sample(ch, frame, s * self.gain);
            }
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
    fn unity_gain_is_identity() {
        let mut bytes = vec![0u8; 4 * 2 * 4];
        let view = ChannelView::interleaved(&mut bytes, 2, 4, 4);
        let mut data = AudioData::new(view, Format::FloatLE, 44_100);
        data.view_mut().set_sample(0, 0, 0.5f32);
        let mut gain = Gain::new(1.0);
        let prep = PrepareContext { sample_rate: 44_100, channels: 2, max_block_frames: 4, access_pattern: crate::view::AccessPattern::Interleaved };
        gain.prepare(&prep).unwrap();
        gain.process(&mut ctx(&mut data));
        assert_eq!(data.view().sample::<f32>(0, 0), 0.5);
    }

    #[test]
    fn zero_gain_silences() {
        let mut bytes = vec![0u8; 2 * 1 * 4];
        let view = ChannelView::interleaved(&mut bytes, 1, 2, 4);
        let mut data = AudioData::new(view, Format::FloatLE, 44_100);
        data.view_mut().set_sample(0, 0, 1.0f32);
        data.view_mut().set_sample(0, 1, -1.0f32);
        let mut gain = Gain::new(0.0);
        gain.process(&mut ctx(&mut data));
        assert_eq!(data.view().sample::<f32>(0, 0), 0.0);
        assert_eq!(data.view().sample::<f32>(0, 1), 0.0);
    }

    #[test]
    fn halving_gain_scales_samples() {
        let mut bytes = vec![0u8; 1 * 1 * 4];
        let view = ChannelView::interleaved(&mut bytes, 1, 1, 4);
        let mut data = AudioData::new(view, Format::FloatLE, 44_100);
        data.view_mut().set_sample(0, 0, 0.8f32);
        let mut gain = Gain::new(0.5);
        gain.process(&mut ctx(&mut data));
        assert!((data.view().sample::<f32>(0, 0) - 0.4).abs() < 1e-6);
    }
}
