//! The processing-node abstraction: the trait object idiom that stands in
//! for a handwritten vtable, plus the context types the playback loop
//! passes through `prepare`/`process`.

use crate::descriptor::AudioData;
use crate::view::AccessPattern;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// What `node.prepare` was given: the negotiated stream shape, fixed for
/// the lifetime of the node (dynamic reconfiguration while running is out
/// of scope).
#[derive(Debug, Copy, Clone)]
pub struct PrepareContext {
    pub sample_rate: u32,
    pub channels: u32,
    pub max_block_frames: u32,
    pub access_pattern: AccessPattern,
}

/// What `node.process` is given each call: the current transfer window.
/// Borrowed, scoped to one call — a node must not retain it.
#[derive(Debug)]
pub struct ProcessContext<'a, 'd> {
    pub data: &'a mut AudioData<'d>,
}

/// The one failure `Node::prepare` may report — typically a request for
/// more scratch memory than the host is willing to grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationError(pub String);

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node allocation failed: {}", self.0)
    }
}

impl std::error::Error for AllocationError {}

/// A node's lifecycle stage, observable lock-free by a controller thread
/// while the audio thread runs. Stored as an `AtomicU8` rather than this
/// enum directly — see [`NodeHandle::status`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Init = 0,
    Ready = 1,
    Processed = 2,
}

impl Status {
    fn from_u8(v: u8) -> Status {
        match v {
            0 => Status::Init,
            1 => Status::Ready,
            _ => Status::Processed,
        }
    }
}

/// A unit of DSP: gain, an oscillator, a mixer, anything that consumes or
/// produces samples in the transfer window. Implementations are invoked
/// from the playback loop's callback, never directly from application
/// code reaching into the ring.
pub trait Node: Send {
    /// Called once before the loop starts running, with the stream shape
    /// it will see on every subsequent `process` call.
    fn prepare(&mut self, ctx: &PrepareContext) -> Result<(), AllocationError>;

    /// Called once per transfer window at audio rate. Must not block,
    /// allocate, or log at a level that can fail — the realtime
    /// constraints of the callback become this method's constraints.
    fn process(&mut self, ctx: &mut ProcessContext<'_, '_>);

    /// Called exactly once when the node is released. Default is a no-op;
    /// override to release resources `prepare` acquired. Prefer `Drop` on
    /// the node itself where possible — this exists for nodes that need to
    /// distinguish "released by the graph" from "dropped on an error path".
    fn destroy(&mut self) {}
}

/// Owns a boxed [`Node`] and tracks its lifecycle with an atomic status a
/// controller thread can observe without locking. `destroy` is invoked
/// exactly once, from `Drop`, the idiomatic Rust substitute for an
/// explicit "release exactly once" vtable slot.
pub struct NodeHandle {
    node: Box<dyn Node>,
    status: AtomicU8,
}

impl NodeHandle {
    pub fn new(node: impl Node + 'static) -> Self {
        NodeHandle { node: Box::new(node), status: AtomicU8::new(Status::Init as u8) }
    }

    pub fn status(&self) -> Status {
        Status::from_u8(self.status.load(Ordering::SeqCst))
    }

    pub fn prepare(&mut self, ctx: &PrepareContext) -> Result<(), AllocationError> {
        self.node.prepare(ctx)?;
        self.status.store(Status::Ready as u8, Ordering::SeqCst);
        Ok(())
    }

    pub fn process(&mut self, ctx: &mut ProcessContext<'_, '_>) {
        self.node.process(ctx);
        self.status.store(Status::Processed as u8, Ordering::SeqCst);
    }
}

impl Drop for NodeHandle {
    fn drop(&mut self) {
        self.node.destroy();
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeHandle(status: {:?})", self.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct CountsDestroy(Arc<AtomicUsize>);

    impl Node for CountsDestroy {
        fn prepare(&mut self, _ctx: &PrepareContext) -> Result<(), AllocationError> {
            Ok(())
        }
        fn process(&mut self, _ctx: &mut ProcessContext<'_, '_>) {}
        fn destroy(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn destroy_runs_exactly_once_on_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = NodeHandle::new(CountsDestroy(count.clone()));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        drop(handle);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn status_transitions_init_ready() {
        struct Noop;
        impl Node for Noop {
            fn prepare(&mut self, _ctx: &PrepareContext) -> Result<(), AllocationError> {
                Ok(())
            }
            fn process(&mut self, _ctx: &mut ProcessContext<'_, '_>) {}
        }
        let mut handle = NodeHandle::new(Noop);
        assert_eq!(handle.status(), Status::Init);
        let ctx = PrepareContext { sample_rate: 44_100, channels: 2, max_block_frames: 1024, access_pattern: crate::view::AccessPattern::Interleaved };
        handle.prepare(&ctx).unwrap();
        assert_eq!(handle.status(), Status::Ready);
    }

    #[test]
    fn failing_prepare_reports_allocation_error() {
        struct AlwaysFails;
        impl Node for AlwaysFails {
            fn prepare(&mut self, _ctx: &PrepareContext) -> Result<(), AllocationError> {
                Err(AllocationError("no scratch buffer".into()))
            }
            fn process(&mut self, _ctx: &mut ProcessContext<'_, '_>) {}
        }
        let mut handle = NodeHandle::new(AlwaysFails);
        let ctx = PrepareContext { sample_rate: 44_100, channels: 2, max_block_frames: 1024, access_pattern: crate::view::AccessPattern::Interleaved };
        assert!(handle.prepare(&ctx).is_err());
        assert_eq!(handle.status(), Status::Init);
    }
}
