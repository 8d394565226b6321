//! The playback I/O loop: moves frames between the mmap PCM ring and the
//! node graph, recovering from xruns and device suspends without ever
//! handing a node an invalid window.

use crate::descriptor::AudioData;
use crate::device::PreparedDevice;
use crate::error::Error;
use crate::node::{AllocationError, Node, PrepareContext, ProcessContext};
use crate::view::{AccessPattern, ChannelView};
use log::{debug, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const INITIAL_BACKOFF: Duration = Duration::from_micros(100);
const MAX_BACKOFF: Duration = Duration::from_millis(50);
const MAX_RETRY: u32 = 50;

/// The playback loop's error taxonomy. `Suspended` is deliberately not a
/// variant here: a device suspend is recovered internally by resuming the
/// stream, and only surfaces as an error if recovery itself fails, which
/// re-presents as [`LoopError::Timeout`] or [`LoopError::Unexpected`].
#[derive(Debug)]
pub enum LoopError {
    /// The stream could not be started (`snd_pcm_start` failed, or the
    /// device never reached a startable state).
    Start(Error),
    /// An xrun occurred and recovery (`snd_pcm_prepare`) itself failed.
    Xrun(Error),
    /// Suspend recovery exhausted its retry budget without the device
    /// becoming ready again.
    Timeout,
    /// The node graph's `prepare` step failed before the loop ever started
    /// transferring frames.
    Prepare(AllocationError),
    /// Any other ALSA error the loop can't classify into the above.
    Unexpected(Error),
}

impl fmt::Display for LoopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopError::Start(e) => write!(f, "failed to start playback: {}", e),
            LoopError::Xrun(e) => write!(f, "xrun recovery failed: {}", e),
            LoopError::Timeout => write!(f, "suspend recovery timed out"),
            LoopError::Prepare(e) => write!(f, "node graph failed to prepare: {}", e),
            LoopError::Unexpected(e) => write!(f, "unexpected playback error: {}", e),
        }
    }
}

impl std::error::Error for LoopError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoopError::Start(e) | LoopError::Xrun(e) | LoopError::Unexpected(e) => Some(e),
            LoopError::Prepare(e) => Some(e),
            LoopError::Timeout => None,
        }
    }
}

/// A handle the controller thread uses to request the playback loop stop.
/// Cloning shares the same underlying flag, so any number of controllers
/// can request a stop.
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    /// Requests the loop stop at the next convenient point. A release
    /// store, paired with the loop's acquire load, so the request is
    /// visible as soon as it's observed.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Drives one [`PreparedDevice`] through its mmap ring, invoking a
/// [`Node`] once per transfer window.
pub struct PlaybackLoop<N: Node> {
    device: PreparedDevice,
    node: N,
    running: Arc<AtomicBool>,
    stopped: bool,
}

impl<N: Node> PlaybackLoop<N> {
    pub fn new(device: PreparedDevice, node: N) -> Self {
        PlaybackLoop { device, node, running: Arc::new(AtomicBool::new(false)), stopped: false }
    }

    /// Returns a handle a controller thread can use to request a stop.
    /// Must be called before [`PlaybackLoop::run`], which takes `self` by
    /// value.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle { running: self.running.clone() }
    }

    /// Runs the loop until a [`StopHandle::stop`] request is observed or
    /// an unrecoverable error occurs. Blocks the calling thread — run this
    /// on a dedicated realtime-priority thread, not the controller's.
    ///
    /// Each iteration follows the same shape: observe PCM state and recover
    /// from xrun/suspend, query `avail`, start the stream once there's
    /// something queued for it, wait for room if there isn't, then drain a
    /// full `buffer_size` worth of frames through the node before looping.
    pub fn run(mut self) -> Result<(), LoopError> {
        self.running.store(true, Ordering::Release);

        let ctx = PrepareContext {
            sample_rate: self.device.rate(),
            channels: self.device.channels(),
            max_block_frames: self.device.buffer_size() as u32,
            access_pattern: self.device.access(),
        };
        self.node.prepare(&ctx).map_err(LoopError::Prepare)?;

        let buffer_size = self.device.buffer_size();
        let mut retry = 0u32;
        let mut backoff = INITIAL_BACKOFF;
        self.stopped = true;

        'outer: while self.running.load(Ordering::Acquire) {
            // 1. Observe PCM state.
            let raw_state = self.device.pcm().raw_state();
            if raw_state < 0 {
                return Err(LoopError::Unexpected(Error::new("snd_pcm_state", raw_state)));
            }
            match crate::pcm::State::from_raw(raw_state) {
                Some(crate::pcm::State::XRun) => {
                    warn!("xrun detected, recovering");
                    self.device.pcm().prepare().map_err(LoopError::Xrun)?;
                    self.stopped = true;
                    continue;
                }
                Some(crate::pcm::State::Suspended) => {
                    self.recover_from_suspend(&mut retry, &mut backoff)?;
                    continue;
                }
                None => return Err(LoopError::Unexpected(Error::new("snd_pcm_state", raw_state))),
                _ => {}
            }

            // 2. Query available frames.
            let avail = self.device.pcm().avail_update();
            if avail < 0 {
                warn!("avail_update reported an error, recovering");
                self.device.pcm().prepare().map_err(LoopError::Xrun)?;
                self.stopped = true;
                continue;
            }

            // 3. Start gate: once there's less than a full ring writable
            // and we haven't started yet, kick the stream. A successful
            // start never delivers frames in the same iteration.
            if avail < buffer_size && self.stopped {
                self.device.pcm().start().map_err(LoopError::Start)?;
                self.stopped = false;
                continue;
            }

            // 4. Wait gate: started but the ring isn't full yet, wait for
            // room rather than busy-spinning.
            if avail < buffer_size && !self.stopped {
                if self.device.pcm().wait(Some(self.device.timeout().as_millis() as u32)).is_err() {
                    self.device.pcm().prepare().map_err(LoopError::Xrun)?;
                    self.stopped = true;
                }
                continue;
            }

            // 5. Transfer window: drain a full buffer_size worth of frames,
            // the driver may grant them in more than one mmap window.
            let mut to_transfer = buffer_size;
            while to_transfer > 0 {
                let (areas, offset, expected) = match self.device.pcm().mmap_begin(to_transfer) {
                    Ok(v) => v,
                    Err(_) => {
                        warn!("mmap_begin failed, recovering");
                        self.device.pcm().prepare().map_err(LoopError::Xrun)?;
                        self.stopped = true;
                        continue 'outer;
                    }
                };
                if expected == 0 {
                    // Nothing granted this pass; re-check state/avail
                    // rather than spinning on an empty window.
                    continue 'outer;
                }

                {
                    let view = build_view(
                        &areas,
                        self.device.access(),
                        self.device.channels(),
                        expected,
                        self.device.format().bytes_per_sample(),
                    )
                    .ok_or_else(|| LoopError::Unexpected(Error::new("snd_pcm_mmap_begin", -1)))?;
                    let mut data = AudioData::new(view, self.device.format(), ctx.sample_rate);
                    let mut pctx = ProcessContext { data: &mut data };
                    self.node.process(&mut pctx);
                }

                let committed = self.device.pcm().mmap_commit(offset, expected);
                if committed < 0 {
                    warn!("xrun during commit, recovering");
                    self.device.pcm().prepare().map_err(LoopError::Xrun)?;
                    self.stopped = true;
                    continue 'outer;
                }
                if committed != expected {
                    // A partial commit means the ring underran mid-transfer.
                    warn!("partial commit ({} of {}), forcing xrun recovery", committed, expected);
                    self.device.pcm().prepare().map_err(LoopError::Xrun)?;
                    self.stopped = true;
                    continue 'outer;
                }

                retry = 0;
                backoff = INITIAL_BACKOFF;
                to_transfer -= committed;
            }
        }

        self.device.pcm().drain().ok();
        self.stopped = true;
        Ok(())
    }

    /// Resumes a suspended stream with exponential backoff while `resume`
    /// reports `EAGAIN`. Any other failure falls through to `prepare`, the
    /// same recovery path an xrun takes.
    fn recover_from_suspend(&mut self, retry: &mut u32, backoff: &mut Duration) -> Result<(), LoopError> {
        loop {
            match self.device.pcm().resume() {
                Ok(()) => {
                    debug!("resumed from suspend after {} retries", retry);
                    *retry = 0;
                    *backoff = INITIAL_BACKOFF;
                    return Ok(());
                }
                Err(e) if e.errno() == -libc::EAGAIN => {
                    *retry += 1;
                    if *retry >= MAX_RETRY {
                        return Err(LoopError::Timeout);
                    }
                    thread::sleep(*backoff);
                    *backoff = (*backoff * 2).min(MAX_BACKOFF);
                }
                Err(_) => {
                    self.device.pcm().prepare().map_err(LoopError::Xrun)?;
                    self.stopped = true;
                    *retry = 0;
                    *backoff = INITIAL_BACKOFF;
                    return Ok(());
                }
            }
        }
    }
}

impl<N: Node> Drop for PlaybackLoop<N> {
    fn drop(&mut self) {
        if !self.stopped {
            self.running.store(false, Ordering::Release);
        }
        // `run` takes `self` by value, so this fires exactly once whether
        // `run` returned `Ok` or bailed out through `?` on a fatal error —
        // the node's `destroy` contract is "called exactly once" either way.
        self.node.destroy();
    }
}

impl<N: Node> fmt::Debug for PlaybackLoop<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackLoop")
            .field("device", &self.device)
            .field("running", &self.running.load(Ordering::Acquire))
            .field("stopped", &self.stopped)
            .finish()
    }
}

/// Resolves a writable [`ChannelView`] from the areas `mmap_begin` handed
/// back. A null area is a driver invariant break, not a recoverable
/// condition — the caller turns it into [`LoopError::Unexpected`] rather
/// than transferring through a dangling pointer.
fn build_view<'a>(
    areas: &'a crate::pcm::ChannelAreas,
    access: AccessPattern,
    channels: u32,
    frames: crate::pcm::Frames,
    bytes_per_sample: usize,
) -> Option<ChannelView<'a>> {
    match access {
        AccessPattern::Interleaved => {
            let (ptr, _step) = unsafe { areas.area(0) }?;
            let len = frames as usize * channels as usize * bytes_per_sample;
            let slice = unsafe { std::slice::from_raw_parts_mut(ptr, len) };
            Some(ChannelView::interleaved(slice, channels, frames, bytes_per_sample))
        }
        AccessPattern::Planar => {
            let mut slices = Vec::with_capacity(channels as usize);
            for ch in 0..channels as usize {
                let (ptr, _step) = unsafe { areas.area(ch) }?;
                let len = frames as usize * bytes_per_sample;
                slices.push(unsafe { std::slice::from_raw_parts_mut(ptr, len) });
            }
            Some(ChannelView::planar(slices, frames, bytes_per_sample))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_handle_shares_flag_with_loop() {
        let running = Arc::new(AtomicBool::new(true));
        let handle = StopHandle { running: running.clone() };
        assert!(handle.is_running());
        handle.stop();
        assert!(!running.load(Ordering::Acquire));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut backoff = INITIAL_BACKOFF;
        for _ in 0..20 {
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
        assert_eq!(backoff, MAX_BACKOFF);
    }

    #[test]
    fn loop_error_display_mentions_kind() {
        let e = LoopError::Timeout;
        assert!(e.to_string().contains("timed out"));
    }
}
