//! Futex-based parking for producers blocked on a full channel
//!
//! The futex word is a sequence number bumped by every successful claim.
//!
//! A producer that finds the buffer full:
//! 1. Took a `snapshot()` of the sequence *before* checking fullness
//! 2. FUTEX_WAITs on that value (returns at once if a claim happened since)
//! 3. Re-checks the buffer on return
//!
//! A consumer, after freeing a slot:
//! 1. Bumps the sequence
//! 2. FUTEX_WAKEs all parked producers, skipped when none are parked
//!
//! Taking the snapshot before the fullness check is what rules out lost
//! wakeups.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

pub struct SpaceSignal {
    /// Futex word: claim sequence number
    seq: AtomicU32,

    /// Producers currently inside `wait`
    parked: AtomicUsize,
}

impl SpaceSignal {
    pub const fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
            parked: AtomicUsize::new(0),
        }
    }

    /// Current sequence; take this before checking whether the buffer is full
    #[inline]
    pub fn snapshot(&self) -> u32 {
        self.seq.load(Ordering::Acquire)
    }

    /// Park until the sequence moves past `seen` or `timeout` elapses.
    ///
    /// Returns `true` if woken by `notify_all` (or the sequence had already
    /// moved), `false` on timeout, signal, or spurious wakeup. Callers
    /// re-check the buffer either way.
    pub fn wait(&self, seen: u32, timeout: Option<Duration>) -> bool {
        self.parked.fetch_add(1, Ordering::SeqCst);

        if self.seq.load(Ordering::SeqCst) != seen {
            self.parked.fetch_sub(1, Ordering::SeqCst);
            return true;
        }

        let timespec = timeout.map(|d| libc::timespec {
            tv_sec: d.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
            tv_nsec: d.subsec_nanos() as _,
        });
        let timespec_ptr = match &timespec {
            Some(ts) => ts as *const libc::timespec,
            None => std::ptr::null(),
        };

        // FUTEX_WAIT: sleep only while seq == seen
        let result = unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.seq.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                seen,
                timespec_ptr,
                std::ptr::null::<u32>(),
                0u32,
            )
        };

        self.parked.fetch_sub(1, Ordering::SeqCst);

        if result == 0 {
            true
        } else {
            // EAGAIN: the sequence moved before we slept, which is a wakeup
            nix::errno::Errno::last() == nix::errno::Errno::EAGAIN
        }
    }

    /// Record a freed slot and wake every parked producer
    pub fn notify_all(&self) {
        self.seq.fetch_add(1, Ordering::SeqCst);

        if self.parked.load(Ordering::SeqCst) == 0 {
            return;
        }

        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.seq.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                i32::MAX,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }

    /// Parked producer count (hint, may be stale)
    #[cfg(test)]
    fn parked_count(&self) -> usize {
        self.parked.load(Ordering::Relaxed)
    }
}

impl Default for SpaceSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_wait_timeout() {
        let signal = SpaceSignal::new();
        let seen = signal.snapshot();

        let start = Instant::now();
        let woken = signal.wait(seen, Some(Duration::from_millis(40)));
        assert!(!woken);
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(signal.parked_count(), 0);
    }

    #[test]
    fn test_stale_snapshot_returns_immediately() {
        let signal = SpaceSignal::new();
        let seen = signal.snapshot();
        signal.notify_all();

        let start = Instant::now();
        assert!(signal.wait(seen, Some(Duration::from_secs(10))));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_notify_wakes_parked() {
        let signal = Arc::new(SpaceSignal::new());
        let signal2 = Arc::clone(&signal);
        let seen = signal.snapshot();

        let handle = thread::spawn(move || signal2.wait(seen, Some(Duration::from_secs(10))));

        while signal.parked_count() == 0 {
            thread::yield_now();
        }
        signal.notify_all();

        assert!(handle.join().unwrap());
    }
}
