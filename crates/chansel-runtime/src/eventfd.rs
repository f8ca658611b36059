//! `ReadinessFd` - the per-channel readiness descriptor.
//!
//! A non-blocking eventfd in semaphore mode. The kernel counter is the
//! channel's pending count:
//!
//! - `signal()` adds 1 (one per enqueued item)
//! - `acknowledge()` subtracts exactly 1 (one per claimed item)
//!
//! The fd is readable (EPOLLIN) while the counter is non-zero, which is the
//! level-triggered "queue non-empty" condition every selector waits on. An
//! eventfd may sit in any number of epoll sets at once, so many selectors can
//! watch the same channel.

use nix::errno::Errno;
use nix::sys::eventfd::{EfdFlags, EventFd};

use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};

use chansel_core::error::{SelectError, SelectResult};
use chansel_core::kwarn;

pub struct ReadinessFd {
    efd: EventFd,
}

impl ReadinessFd {
    /// Create a new eventfd with a zero counter.
    ///
    /// The descriptor is owned and closed on drop.
    pub fn new() -> SelectResult<Self> {
        let flags = EfdFlags::EFD_SEMAPHORE | EfdFlags::EFD_NONBLOCK | EfdFlags::EFD_CLOEXEC;
        let efd = EventFd::from_value_and_flags(0, flags)
            .map_err(|e| SelectError::EventFd(e as i32))?;
        Ok(Self { efd })
    }

    /// Add one pending item.
    ///
    /// Fails with EAGAIN only if the counter would reach `u64::MAX - 1`.
    pub fn signal(&self) -> Result<(), i32> {
        self.efd.write(1).map(|_| ()).map_err(|e| e as i32)
    }

    /// Remove one pending item.
    ///
    /// Returns `false` when the counter was already zero (EAGAIN) or the
    /// read failed outright.
    pub fn acknowledge(&self) -> bool {
        match self.efd.read() {
            Ok(_) => true,
            Err(Errno::EAGAIN) => false,
            Err(e) => {
                kwarn!("eventfd {} read failed: {}", self.fd(), e);
                false
            }
        }
    }

    pub fn fd(&self) -> RawFd {
        self.efd.as_raw_fd()
    }
}

impl AsFd for ReadinessFd {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.efd.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semaphore_counting() {
        let rfd = ReadinessFd::new().unwrap();
        assert!(rfd.fd() >= 0);

        // Empty: nothing to acknowledge
        assert!(!rfd.acknowledge());

        rfd.signal().unwrap();
        rfd.signal().unwrap();
        rfd.signal().unwrap();

        // Each read drains exactly one
        assert!(rfd.acknowledge());
        assert!(rfd.acknowledge());
        assert!(rfd.acknowledge());
        assert!(!rfd.acknowledge());
    }

    #[test]
    fn test_distinct_descriptors() {
        let a = ReadinessFd::new().unwrap();
        let b = ReadinessFd::new().unwrap();
        assert_ne!(a.fd(), b.fd());
    }
}
