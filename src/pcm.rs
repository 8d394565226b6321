//! Thin wrapper around the ALSA PCM API: opening a stream, negotiating
//! hardware/software parameters, and the mmap ring transfer primitives
//! (`mmap_begin`/`mmap_commit`) the playback loop drives at audio rate.

use crate::alsa;
use crate::error::{acheck, from_code, Result};
use crate::Direction;
use libc::{c_int, c_uint, c_void, ssize_t};
use std::{fmt, mem, ptr};

/// [`snd_pcm_sframes_t`](http://www.alsa-project.org/alsa-doc/alsa-lib/group___p_c_m.html)
pub type Frames = alsa::snd_pcm_sframes_t;

/// [`snd_pcm_t`](http://www.alsa-project.org/alsa-doc/alsa-lib/group___p_c_m.html)
/// wrapper. Start here to open a device for playback or capture.
pub struct Pcm(*mut alsa::snd_pcm_t);

unsafe impl Send for Pcm {}

impl Pcm {
    pub fn open(name: &std::ffi::CStr, dir: Direction, nonblock: bool) -> Result<Pcm> {
        let mut r = ptr::null_mut();
        let stream = match dir {
            Direction::Capture => alsa::SND_PCM_STREAM_CAPTURE,
            Direction::Playback => alsa::SND_PCM_STREAM_PLAYBACK,
        };
        let flags = if nonblock { alsa::SND_PCM_NONBLOCK } else { 0 };
        acheck!(snd_pcm_open(&mut r, name.as_ptr(), stream, flags)).map(|_| Pcm(r))
    }

    pub fn start(&self) -> Result<()> {
        acheck!(snd_pcm_start(self.0)).map(|_| ())
    }

    pub fn drop_stream(&self) -> Result<()> {
        acheck!(snd_pcm_drop(self.0)).map(|_| ())
    }

    pub fn prepare(&self) -> Result<()> {
        acheck!(snd_pcm_prepare(self.0)).map(|_| ())
    }

    pub fn resume(&self) -> Result<()> {
        let r = unsafe { alsa::snd_pcm_resume(self.0) };
        from_code("snd_pcm_resume", r).map(|_| ())
    }

    pub fn drain(&self) -> Result<()> {
        acheck!(snd_pcm_drain(self.0)).map(|_| ())
    }

    /// Returns `Ok(true)` if the PCM became ready within `timeout_ms`
    /// (`None` waits indefinitely), `Ok(false)` on timeout.
    pub fn wait(&self, timeout_ms: Option<u32>) -> Result<bool> {
        let ms = timeout_ms.map(|x| x as c_int).unwrap_or(-1);
        acheck!(snd_pcm_wait(self.0, ms)).map(|i| i == 1)
    }

    /// Raw PCM state as returned by the kernel, not yet validated as one of
    /// the documented `SND_PCM_STATE_*` constants. The playback loop checks
    /// the sign of this before mapping it to [`State`].
    pub fn raw_state(&self) -> c_int {
        unsafe { alsa::snd_pcm_state(self.0) as c_int }
    }

    pub fn state(&self) -> Option<State> {
        State::from_raw(self.raw_state())
    }

    pub fn bytes_to_frames(&self, i: isize) -> Frames {
        unsafe { alsa::snd_pcm_bytes_to_frames(self.0, i as ssize_t) }
    }

    pub fn frames_to_bytes(&self, i: Frames) -> isize {
        unsafe { alsa::snd_pcm_frames_to_bytes(self.0, i) as isize }
    }

    /// Number of frames available to write (playback) or read (capture),
    /// without forcing an update from the kernel first.
    pub fn avail_update(&self) -> Frames {
        unsafe { alsa::snd_pcm_avail_update(self.0) }
    }

    pub fn hw_params(&self, h: &HwParams<'_>) -> Result<()> {
        acheck!(snd_pcm_hw_params(self.0, h.0)).map(|_| ())
    }

    pub fn hw_params_current(&self) -> Result<HwParams<'_>> {
        HwParams::new(self).and_then(|h| {
            acheck!(snd_pcm_hw_params_current(self.0, h.0)).map(|_| h)
        })
    }

    pub fn sw_params(&self, h: &SwParams<'_>) -> Result<()> {
        acheck!(snd_pcm_sw_params(self.0, h.0)).map(|_| ())
    }

    pub fn sw_params_current(&self) -> Result<SwParams<'_>> {
        SwParams::new(self).and_then(|h| {
            acheck!(snd_pcm_sw_params_current(self.0, h.0)).map(|_| h)
        })
    }

    /// Begin a writable (or readable) window into the mmap ring.
    ///
    /// `wanted` is the number of frames the caller would like; the driver
    /// may grant fewer. Returns the area description, the ring offset (in
    /// frames) the window starts at, and the number of frames actually
    /// granted. A granted count of zero is legal and means "nothing to do
    /// yet" — it does not imply the areas pointer is valid for dereference.
    pub fn mmap_begin(&self, wanted: Frames) -> Result<(ChannelAreas, Frames, Frames)> {
        let mut areas: *const alsa::snd_pcm_channel_area_t = ptr::null();
        let mut offset: alsa::snd_pcm_uframes_t = 0;
        let mut frames: alsa::snd_pcm_uframes_t = wanted as alsa::snd_pcm_uframes_t;
        acheck!(snd_pcm_mmap_begin(self.0, &mut areas, &mut offset, &mut frames))?;
        Ok((ChannelAreas(areas), offset as Frames, frames as Frames))
    }

    /// Commit `frames` frames written/read at `offset` (as returned by the
    /// matching [`Pcm::mmap_begin`]). Returns the number of frames actually
    /// committed, which the caller must compare against what it asked for.
    pub fn mmap_commit(&self, offset: Frames, frames: Frames) -> Frames {
        unsafe {
            alsa::snd_pcm_mmap_commit(
                self.0,
                offset as alsa::snd_pcm_uframes_t,
                frames as alsa::snd_pcm_uframes_t,
            )
        }
    }

    pub fn io(&self) -> Io<'_> {
        Io(self)
    }
}

impl Drop for Pcm {
    fn drop(&mut self) {
        unsafe { alsa::snd_pcm_close(self.0) };
    }
}

impl fmt::Debug for Pcm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pcm(state: {:?})", self.state())
    }
}

/// A raw `snd_pcm_channel_area_t*` returned by [`Pcm::mmap_begin`]. For
/// interleaved access this points to a single area; for noninterleaved
/// access it points to `n_channels` consecutive areas. Building a typed
/// [`crate::view::ChannelView`] out of this is `view.rs`'s job, not this
/// module's — `pcm.rs` only speaks bytes and offsets.
#[derive(Debug, Clone, Copy)]
pub struct ChannelAreas(pub(crate) *const alsa::snd_pcm_channel_area_t);

impl ChannelAreas {
    /// Reads area `index` and returns its base pointer (already advanced
    /// past `first`, which in practice is always zero for interleaved and
    /// noninterleaved hardware access) plus its step in bytes between
    /// consecutive samples on the *same* channel.
    ///
    /// # Safety
    /// `index` must be in bounds for the area count negotiated for this
    /// stream (1 for interleaved, `channels` for noninterleaved), and the
    /// returned pointer is only valid for the duration of the matching mmap
    /// window.
    pub unsafe fn area(&self, index: usize) -> Option<(*mut u8, usize)> {
        if self.0.is_null() {
            return None;
        }
        let area = unsafe { &*self.0.add(index) };
        if area.addr.is_null() {
            return None;
        }
        let byte_offset = area.first as usize / 8;
        let step_bytes = area.step as usize / 8;
        Some((unsafe { (area.addr as *mut u8).add(byte_offset) }, step_bytes))
    }
}

/// `std::io::Read`/`std::io::Write` over a [`Pcm`] using the blocking
/// `snd_pcm_readi`/`snd_pcm_writei` calls. Not part of the realtime path;
/// useful for tests and simple non-realtime producers/consumers.
pub struct Io<'a>(&'a Pcm);

impl std::io::Read for Io<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let size = self.0.bytes_to_frames(buf.len() as isize) as alsa::snd_pcm_uframes_t;
        let r = unsafe { alsa::snd_pcm_readi((self.0).0, buf.as_mut_ptr() as *mut c_void, size) };
        if r < 0 {
            Err(std::io::Error::from_raw_os_error(r as i32))
        } else {
            Ok(self.0.frames_to_bytes(r) as usize)
        }
    }
}

impl std::io::Write for Io<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.0.bytes_to_frames(buf.len() as isize) as alsa::snd_pcm_uframes_t;
        let r = unsafe { alsa::snd_pcm_writei((self.0).0, buf.as_ptr() as *const c_void, size) };
        if r < 0 {
            Err(std::io::Error::from_raw_os_error(r as i32))
        } else {
            Ok(self.0.frames_to_bytes(r) as usize)
        }
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// [`SND_PCM_STATE_*`](http://www.alsa-project.org/alsa-doc/alsa-lib/group___p_c_m.html)
/// constants.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    Open = alsa::SND_PCM_STATE_OPEN as isize,
    Setup = alsa::SND_PCM_STATE_SETUP as isize,
    Prepared = alsa::SND_PCM_STATE_PREPARED as isize,
    Running = alsa::SND_PCM_STATE_RUNNING as isize,
    XRun = alsa::SND_PCM_STATE_XRUN as isize,
    Draining = alsa::SND_PCM_STATE_DRAINING as isize,
    Paused = alsa::SND_PCM_STATE_PAUSED as isize,
    Suspended = alsa::SND_PCM_STATE_SUSPENDED as isize,
    Disconnected = alsa::SND_PCM_STATE_DISCONNECTED as isize,
}

impl State {
    /// Maps a raw `snd_pcm_state_t`, returning `None` for a negative or
    /// out-of-range value instead of transmuting garbage.
    pub fn from_raw(raw: c_int) -> Option<State> {
        if raw < alsa::SND_PCM_STATE_OPEN as c_int || raw > alsa::SND_PCM_STATE_DISCONNECTED as c_int {
            return None;
        }
        Some(unsafe { mem::transmute::<u8, State>(raw as u8) })
    }
}

/// [`SND_PCM_FORMAT_*`](http://www.alsa-project.org/alsa-doc/alsa-lib/group___p_c_m.html)
/// constants. Only the formats `loomline` actually negotiates are exposed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Format {
    S16LE = alsa::SND_PCM_FORMAT_S16_LE as isize,
    FloatLE = alsa::SND_PCM_FORMAT_FLOAT_LE as isize,
    Float64LE = alsa::SND_PCM_FORMAT_FLOAT64_LE as isize,
}

impl Format {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Format::S16LE => 2,
            Format::FloatLE => 4,
            Format::Float64LE => 8,
        }
    }
}

/// [`SND_PCM_ACCESS_*`](http://www.alsa-project.org/alsa-doc/alsa-lib/group___p_c_m.html)
/// constants.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Access {
    MMapInterleaved = alsa::SND_PCM_ACCESS_MMAP_INTERLEAVED as isize,
    MMapNonInterleaved = alsa::SND_PCM_ACCESS_MMAP_NONINTERLEAVED as isize,
}

/// [`snd_pcm_hw_params_t`](http://www.alsa-project.org/alsa-doc/alsa-lib/group___p_c_m___h_w___params.html)
/// wrapper.
pub struct HwParams<'a>(*mut alsa::snd_pcm_hw_params_t, &'a Pcm);

impl Drop for HwParams<'_> {
    fn drop(&mut self) {
        unsafe { alsa::snd_pcm_hw_params_free(self.0) };
    }
}

impl<'a> HwParams<'a> {
    fn new(a: &'a Pcm) -> Result<HwParams<'a>> {
        let mut p = ptr::null_mut();
        acheck!(snd_pcm_hw_params_malloc(&mut p)).map(|_| HwParams(p, a))
    }

    pub fn any(a: &'a Pcm) -> Result<HwParams<'a>> {
        HwParams::new(a).and_then(|p| acheck!(snd_pcm_hw_params_any((p.1).0, p.0)).map(|_| p))
    }

    pub fn set_channels(&self, v: u32) -> Result<()> {
        acheck!(snd_pcm_hw_params_set_channels((self.1).0, self.0, v as c_uint)).map(|_| ())
    }

    pub fn get_channels(&self) -> Result<u32> {
        let mut v = 0;
        acheck!(snd_pcm_hw_params_get_channels(self.0, &mut v)).map(|_| v as u32)
    }

    pub fn set_rate(&self, v: u32, dir: i32) -> Result<()> {
        acheck!(snd_pcm_hw_params_set_rate((self.1).0, self.0, v as c_uint, dir as c_int)).map(|_| ())
    }

    pub fn get_rate(&self) -> Result<u32> {
        let (mut v, mut d) = (0, 0);
        acheck!(snd_pcm_hw_params_get_rate(self.0, &mut v, &mut d)).map(|_| v as u32)
    }

    pub fn set_format(&self, v: Format) -> Result<()> {
        acheck!(snd_pcm_hw_params_set_format((self.1).0, self.0, v as c_int)).map(|_| ())
    }

    pub fn set_access(&self, v: Access) -> Result<()> {
        acheck!(snd_pcm_hw_params_set_access((self.1).0, self.0, v as c_uint)).map(|_| ())
    }

    pub fn set_period_size_near(&self, v: Frames, dir: i32) -> Result<Frames> {
        let mut v = v as alsa::snd_pcm_uframes_t;
        let mut dir = dir as c_int;
        acheck!(snd_pcm_hw_params_set_period_size_near((self.1).0, self.0, &mut v, &mut dir)).map(|_| v as Frames)
    }

    pub fn get_period_size(&self) -> Result<Frames> {
        let (mut v, mut d) = (0, 0);
        acheck!(snd_pcm_hw_params_get_period_size(self.0, &mut v, &mut d)).map(|_| v as Frames)
    }

    pub fn set_buffer_size(&self, v: Frames) -> Result<()> {
        acheck!(snd_pcm_hw_params_set_buffer_size((self.1).0, self.0, v as alsa::snd_pcm_uframes_t)).map(|_| ())
    }

    pub fn set_buffer_size_near(&self, v: Frames) -> Result<Frames> {
        let mut v = v as alsa::snd_pcm_uframes_t;
        acheck!(snd_pcm_hw_params_set_buffer_size_near((self.1).0, self.0, &mut v)).map(|_| v as Frames)
    }

    pub fn get_buffer_size(&self) -> Result<Frames> {
        let mut v = 0;
        acheck!(snd_pcm_hw_params_get_buffer_size(self.0, &mut v)).map(|_| v as Frames)
    }
}

impl fmt::Debug for HwParams<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HwParams(channels: {:?}, rate: {:?} Hz, period size: {:?} frames, buffer size: {:?} frames)",
            self.get_channels(),
            self.get_rate(),
            self.get_period_size(),
            self.get_buffer_size()
        )
    }
}

/// [`snd_pcm_sw_params_t`](http://www.alsa-project.org/alsa-doc/alsa-lib/group___p_c_m___s_w___params.html)
/// wrapper.
pub struct SwParams<'a>(*mut alsa::snd_pcm_sw_params_t, &'a Pcm);

impl Drop for SwParams<'_> {
    fn drop(&mut self) {
        unsafe { alsa::snd_pcm_sw_params_free(self.0) };
    }
}

impl<'a> SwParams<'a> {
    fn new(a: &'a Pcm) -> Result<SwParams<'a>> {
        let mut p = ptr::null_mut();
        acheck!(snd_pcm_sw_params_malloc(&mut p)).map(|_| SwParams(p, a))
    }

    pub fn set_avail_min(&self, v: Frames) -> Result<()> {
        acheck!(snd_pcm_sw_params_set_avail_min((self.1).0, self.0, v as alsa::snd_pcm_uframes_t)).map(|_| ())
    }

    pub fn set_start_threshold(&self, v: Frames) -> Result<()> {
        acheck!(snd_pcm_sw_params_set_start_threshold((self.1).0, self.0, v as alsa::snd_pcm_uframes_t)).map(|_| ())
    }
}

impl fmt::Debug for SwParams<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SwParams(opaque)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_from_raw_rejects_negative() {
        assert_eq!(State::from_raw(-1), None);
    }

    #[test]
    fn state_from_raw_rejects_out_of_range() {
        assert_eq!(State::from_raw(100), None);
    }

    #[test]
    fn state_from_raw_accepts_running() {
        assert_eq!(State::from_raw(alsa::SND_PCM_STATE_RUNNING as c_int), Some(State::Running));
    }

    #[test]
    fn format_byte_widths() {
        assert_eq!(Format::S16LE.bytes_per_sample(), 2);
        assert_eq!(Format::FloatLE.bytes_per_sample(), 4);
        assert_eq!(Format::Float64LE.bytes_per_sample(), 8);
    }
}
