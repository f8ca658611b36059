//! # Poller - the readiness multiplexer
//!
//! Thin wrapper over a level-triggered epoll instance. Each registered
//! descriptor carries an opaque `u64` tag that `wait_one` hands back when the
//! descriptor is readable. The selector uses its case index as the tag, so no
//! pointers ever go through the kernel.
//!
//! Which descriptor is returned when several are ready at once is whatever
//! epoll reports first. No fairness or FIFO across descriptors is promised.

use nix::errno::Errno;
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags, EpollTimeout};

use std::os::fd::{AsRawFd, BorrowedFd};
use std::time::Duration;

use chansel_core::error::{SelectError, SelectResult};
use chansel_core::{kdebug, ktrace};

pub struct Poller {
    epoll: Epoll,
    /// Descriptors currently in the wait set
    registered: usize,
}

impl Poller {
    /// Create an empty wait set.
    pub fn new() -> SelectResult<Self> {
        let epoll = Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC)
            .map_err(|e| SelectError::PollerCreate(e as i32))?;
        Ok(Self { epoll, registered: 0 })
    }

    /// Start watching `fd` for read-readiness (level-triggered).
    ///
    /// Fails with `AlreadyRegistered` if `fd` is already in this set and with
    /// `Register` for invalid descriptors or resource limits.
    pub fn register(&mut self, fd: BorrowedFd<'_>, tag: u64) -> SelectResult<()> {
        let raw = fd.as_raw_fd();
        let event = EpollEvent::new(EpollFlags::EPOLLIN, tag);
        match self.epoll.add(fd, event) {
            Ok(()) => {
                self.registered += 1;
                kdebug!("poller: fd {} registered with tag {}", raw, tag);
                Ok(())
            }
            Err(Errno::EEXIST) => Err(SelectError::AlreadyRegistered(raw)),
            Err(e) => Err(SelectError::Register { fd: raw, errno: e as i32 }),
        }
    }

    /// Stop watching `fd`.
    ///
    /// Safe to call for descriptors that were never added or already removed;
    /// returns whether a registration was actually dropped.
    pub fn deregister(&mut self, fd: BorrowedFd<'_>) -> bool {
        match self.epoll.delete(fd) {
            Ok(()) => {
                self.registered = self.registered.saturating_sub(1);
                kdebug!("poller: fd {} deregistered", fd.as_raw_fd());
                true
            }
            Err(e) => {
                ktrace!("poller: deregister fd {} ignored: {}", fd.as_raw_fd(), e);
                false
            }
        }
    }

    /// Wait for one ready descriptor and return its tag.
    ///
    /// - `None` timeout blocks the calling thread until something is ready
    /// - `Some(Duration::ZERO)` polls once
    /// - `Some(d)` waits at most roughly `d`
    ///
    /// Returns `Ok(None)` when the timeout expires with nothing ready. A
    /// signal interrupting a bounded wait also yields `Ok(None)`; an unbounded
    /// wait restarts after EINTR.
    pub fn wait_one(&self, timeout: Option<Duration>) -> SelectResult<Option<u64>> {
        let mut events = [EpollEvent::empty()];
        loop {
            let epoll_timeout = match timeout {
                None => EpollTimeout::NONE,
                Some(d) if d.is_zero() => EpollTimeout::ZERO,
                Some(d) => EpollTimeout::try_from(round_up_millis(d)).unwrap_or(EpollTimeout::NONE),
            };

            match self.epoll.wait(&mut events, epoll_timeout) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(events[0].data())),
                Err(Errno::EINTR) if timeout.is_none() => continue,
                Err(Errno::EINTR) => return Ok(None),
                Err(e) => return Err(SelectError::Wait(e as i32)),
            }
        }
    }

    /// Number of descriptors currently registered
    pub fn registered(&self) -> usize {
        self.registered
    }
}

/// epoll works in milliseconds; round up so a short timeout never becomes a
/// zero-timeout poll.
fn round_up_millis(d: Duration) -> Duration {
    let millis = d.as_nanos().div_ceil(1_000_000);
    Duration::from_millis(millis.min(i32::MAX as u128) as u64)
}
