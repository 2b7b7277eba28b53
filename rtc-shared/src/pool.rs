//! A bounded free-list of byte buffers, shared by the UDP receive loop, the RTP
//! packet model and the media send path.
//!
//! Pools never block the caller: when the free-list is empty a fresh buffer is
//! allocated (and logged at `debug!`) rather than making the receive loop wait.
//! Buffers are returned to the pool either explicitly via [`Pool::release`] or
//! implicitly when a [`PooledBuf`] is dropped without being forgotten.

use std::sync::Mutex;

/// Maximum UDP datagram this crate family will ever receive or construct, plus slack
/// for SRTP's auth tag / MKI headroom.
pub const MAX_UDP_SIZE: usize = 1500 + 172;

/// Headroom `rtc-srtp` may append past the RTP header + payload when protecting a
/// packet (auth tag, and vendor MKI some libsrtp builds append).
pub const SRTP_MAX_PREFIX_LENGTH: usize = 148;

struct Inner {
    free: Vec<Vec<u8>>,
    buf_size: usize,
    allocated: u64,
}

/// A bounded pool of same-sized byte buffers.
pub struct Pool {
    inner: Mutex<Inner>,
}

impl Pool {
    pub fn new(buf_size: usize, capacity: usize) -> Self {
        let mut free = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            free.push(vec![0u8; buf_size]);
        }
        Self {
            inner: Mutex::new(Inner {
                free,
                buf_size,
                allocated: capacity as u64,
            }),
        }
    }

    /// Borrow a zeroed buffer of the pool's configured size.
    pub fn acquire(&self) -> Vec<u8> {
        let mut inner = self.inner.lock().unwrap();
        match inner.free.pop() {
            Some(mut buf) => {
                buf.iter_mut().for_each(|b| *b = 0);
                buf
            }
            None => {
                inner.allocated += 1;
                log::debug!(
                    "pool exhausted, allocating buffer #{} of size {}",
                    inner.allocated,
                    inner.buf_size
                );
                vec![0u8; inner.buf_size]
            }
        }
    }

    /// Return a buffer to the free-list. Buffers of the wrong size are dropped
    /// rather than corrupting the pool's uniform sizing invariant.
    pub fn release(&self, buf: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        if buf.len() == inner.buf_size {
            inner.free.push(buf);
        }
    }

    pub fn buf_size(&self) -> usize {
        self.inner.lock().unwrap().buf_size
    }
}

/// An RAII guard around a buffer borrowed from a [`Pool`]: the buffer is returned
/// to the pool automatically on drop unless taken out via [`PooledBuf::into_inner`].
pub struct PooledBuf<'p> {
    pool: &'p Pool,
    buf: Option<Vec<u8>>,
}

impl<'p> PooledBuf<'p> {
    pub fn new(pool: &'p Pool) -> Self {
        Self {
            pool,
            buf: Some(pool.acquire()),
        }
    }

    /// Take the buffer out of the guard without returning it to the pool on drop.
    pub fn into_inner(mut self) -> Vec<u8> {
        self.buf.take().expect("PooledBuf used after into_inner")
    }
}

impl std::ops::Deref for PooledBuf<'_> {
    type Target = Vec<u8>;
    fn deref(&self) -> &Vec<u8> {
        self.buf.as_ref().expect("PooledBuf used after into_inner")
    }
}

impl std::ops::DerefMut for PooledBuf<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        self.buf.as_mut().expect("PooledBuf used after into_inner")
    }
}

impl Drop for PooledBuf<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_release_roundtrip() {
        let pool = Pool::new(64, 2);
        let a = pool.acquire();
        let b = pool.acquire();
        assert_eq!(a.len(), 64);
        pool.release(a);
        pool.release(b);
        // pool exhaustion allocates rather than blocking
        let _c = pool.acquire();
        let _d = pool.acquire();
        let _e = pool.acquire();
    }

    #[test]
    fn released_buffer_is_reused_zeroed() {
        let pool = Pool::new(4, 1);
        let mut a = pool.acquire();
        a[0] = 0xff;
        pool.release(a);
        let b = pool.acquire();
        assert_eq!(b, vec![0u8; 4]);
    }
}
