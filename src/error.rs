//! Low-level ALSA error wrapper.
//!
//! Most ALSA functions return a negative `errno` on failure. [`Error`] wraps
//! that code together with the name of the failing function, exactly like
//! alsa-lib's own convention of surfacing `-errno` from almost everything.

use crate::alsa;
use libc::{c_char, c_int, c_void};
use std::borrow::Cow;
use std::ffi::CStr;
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// An ALSA error: the `errno` returned by a failing `snd_*` call, plus the
/// name of that call for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    func: Option<Cow<'static, str>>,
    errno: c_int,
}

/// Wraps an `unsafe { alsa::snd_foo(...) }` call, turning a negative return
/// value into `Err(Error::new(...))`.
macro_rules! acheck {
    ($f: ident ( $($x: expr),* ) ) => {{
        let r = unsafe { $crate::alsa::$f( $($x),* ) };
        if r < 0 { Err($crate::error::Error::new(stringify!($f), r as ::libc::c_int)) }
        else { Ok(r) }
    }}
}

pub(crate) use acheck;

pub fn from_const<'a>(func: &'static str, s: *const c_char) -> Result<&'a str> {
    if s.is_null() {
        return Err(Error::invalid_str(func));
    }
    let cc = unsafe { CStr::from_ptr(s) };
    std::str::from_utf8(cc.to_bytes()).map_err(|_| Error::invalid_str(func))
}

pub fn from_alloc(func: &'static str, s: *mut c_char) -> Result<String> {
    if s.is_null() {
        return Err(Error::invalid_str(func));
    }
    let c = unsafe { CStr::from_ptr(s) };
    let result = std::str::from_utf8(c.to_bytes())
        .map(|s| s.to_string())
        .map_err(|_| Error::invalid_str(func));
    unsafe {
        libc::free(s as *mut c_void);
    }
    result
}

pub fn from_code(func: &'static str, r: c_int) -> Result<c_int> {
    if r < 0 {
        Err(Error::new(func, r))
    } else {
        Ok(r)
    }
}

impl Error {
    pub fn new(func: &'static str, errno: c_int) -> Error {
        Error { func: Some(func.into()), errno }
    }

    pub fn unsupported(msg: &'static str) -> Error {
        Error { func: Some(msg.into()), errno: -(libc::ENOSYS) }
    }

    fn invalid_str(func: &'static str) -> Error {
        Error { func: Some(func.into()), errno: INVALID_STRING }
    }

    /// The raw, negative `errno` value returned by the failing ALSA call.
    pub fn errno(&self) -> c_int {
        self.errno
    }

    /// The name of the ALSA function that failed, if known.
    pub fn function(&self) -> Option<&str> {
        self.func.as_deref()
    }
}

const INVALID_STRING: c_int = 1;

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cc = unsafe { CStr::from_ptr(alsa::snd_strerror(self.errno)) };
        let msg = std::str::from_utf8(cc.to_bytes()).unwrap_or("(invalid UTF8)");
        match &self.func {
            Some(f2) => write!(f, "ALSA error: '{}' (code {}) from function '{}'", msg, self.errno, f2),
            None => write!(f, "ALSA error: '{}' (code {})", msg, self.errno),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_carries_function_name_and_errno() {
        let e = Error::new("snd_pcm_open", -libc::ENODEV);
        assert_eq!(e.function(), Some("snd_pcm_open"));
        assert_eq!(e.errno(), -libc::ENODEV);
        assert!(e.to_string().contains("snd_pcm_open"));
    }
}
