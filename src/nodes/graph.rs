//! A static, sequential composition of nodes. Not named by the reference
//! node set but grounding the engine-level claim that audio is rendered
//! through a user-defined processing graph: the graph itself is just
//! another [`Node`], so it composes with whatever drives the playback
//! loop without a special case.

use crate::node::{AllocationError, Node, NodeHandle, PrepareContext, ProcessContext, Status};

/// Runs a fixed list of nodes through `process` in registration order,
/// once per transfer window. The node list is frozen at construction —
/// adding or removing nodes while the loop is running is out of scope.
#[derive(Debug)]
pub struct Graph {
    nodes: Vec<NodeHandle>,
}

impl Graph {
    pub fn new() -> Self {
        Graph { nodes: Vec::new() }
    }

    pub fn push(mut self, node: impl Node + 'static) -> Self {
        self.nodes.push(NodeHandle::new(node));
        self
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Lock-free lifecycle status of the node at `index`, for a controller
    /// thread watching progress while the audio thread runs `process`. Out
    /// of bounds returns `None` rather than panicking.
    pub fn status(&self, index: usize) -> Option<Status> {
        self.nodes.get(index).map(NodeHandle::status)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for Graph {
    fn prepare(&mut self, ctx: &PrepareContext) -> Result<(), AllocationError> {
        for handle in &mut self.nodes {
            handle.prepare(ctx)?;
        }
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_, '_>) {
        for handle in &mut self.nodes {
            let mut inner = ProcessContext { data: &mut *ctx.data };
            handle.process(&mut inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::AudioData;
    use crate::nodes::{Gain, Oscillator, Waveform};
    use crate::pcm::Format;
    use crate::view::ChannelView;

    #[test]
    fn runs_nodes_in_registration_order() {
        let mut bytes = vec![0u8; 2 * 1 * 4];
        let view = ChannelView::interleaved(&mut bytes, 1, 2, 4);
        let mut data = AudioData::new(view, Format::FloatLE, 8);

        let mut graph = Graph::new()
            .push(Oscillator::new(Waveform::Square, 1.0, 1.0))
            .push(Gain::new(0.5));

        let prep = PrepareContext { sample_rate: 8, channels: 1, max_block_frames: 2, access_pattern: crate::view::AccessPattern::Interleaved };
        graph.prepare(&prep).unwrap();
        let mut ctx = ProcessContext { data: &mut data };
        graph.process(&mut ctx);

        // oscillator writes +/-1, gain halves it: the graph ran osc then gain.
        assert!((data.view().sample::<f32>(0, 0).abs() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn status_tracks_each_nodes_lifecycle() {
        let mut graph = Graph::new().push(Gain::new(1.0)).push(Gain::new(0.5));
        assert_eq!(graph.status(0), Some(Status::Init));
        assert_eq!(graph.status(1), Some(Status::Init));
        assert_eq!(graph.status(2), None);

        let prep = PrepareContext { sample_rate: 44_100, channels: 1, max_block_frames: 1, access_pattern: crate::view::AccessPattern::Interleaved };
        graph.prepare(&prep).unwrap();
        assert_eq!(graph.status(0), Some(Status::Ready));

        let mut bytes = vec![0u8; 1 * 1 * 4];
        let view = ChannelView::interleaved(&mut bytes, 1, 1, 4);
        let mut data = AudioData::new(view, Format::FloatLE, 44_100);
        let mut ctx = ProcessContext { data: &mut data };
        graph.process(&mut ctx);
        assert_eq!(graph.status(0), Some(Status::Processed));
        assert_eq!(graph.status(1), Some(Status::Processed));
    }

    #[test]
    fn empty_graph_process_is_noop() {
        let mut bytes = vec![0u8; 1 * 1 * 4];
        let view = ChannelView::interleaved(&mut bytes, 1, 1, 4);
        let mut data = AudioData::new(view, Format::FloatLE, 8);
        data.view_mut().set_sample(0, 0, 0.25f32);
        let mut graph = Graph::new();
        assert!(graph.is_empty());
        let mut ctx = ProcessContext { data: &mut data };
        graph.process(&mut ctx);
        assert_eq!(data.view().sample::<f32>(0, 0), 0.25);
    }
}
