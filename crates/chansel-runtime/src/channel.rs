//! Typed MPMC channel with an eventfd readiness descriptor
//!
//! A `Channel<T>` is a cheap, clonable handle; every clone refers to the same
//! buffer. Producers `put`, consumers (usually selector cases) `try_take`.
//!
//! The buffer and the eventfd counter move together under one lock:
//!
//! - `put` pushes and signals (+1) in the same critical section
//! - `try_take` pops and acknowledges (-1) in the same critical section
//!
//! So the counter always equals the number of unclaimed items, the fd is
//! readable exactly while the buffer is non-empty, and two selectors woken by
//! the same item cannot both claim it. The loser simply finds the buffer
//! empty.
//!
//! # Capacity
//!
//! Bounded channels (the default) block `put` while full; the producer spins
//! briefly and then parks on a futex until a consumer frees a slot.
//! Unbounded channels never block. `try_put` never blocks and hands the value
//! back when full. Values are never dropped silently.

use std::collections::VecDeque;
use std::fmt;
use std::os::fd::{AsFd, BorrowedFd, RawFd};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chansel_core::error::{PutError, SelectResult};
use chansel_core::spinlock::SpinLock;
use chansel_core::{ktrace, kwarn};

use crate::config::ChannelConfig;
use crate::eventfd::ReadinessFd;
use crate::parking::SpaceSignal;

pub struct Channel<T> {
    inner: Arc<ChannelInner<T>>,
}

struct ChannelInner<T> {
    /// Buffer + closed flag
    state: SpinLock<ChannelState<T>>,

    /// `None` = unbounded
    capacity: Option<usize>,

    /// Retries before a full producer parks
    put_spins: u32,

    /// Counter == number of unclaimed items
    ready: ReadinessFd,

    /// Full producers park here
    space: SpaceSignal,
}

struct ChannelState<T> {
    queue: VecDeque<T>,
    closed: bool,
}

impl<T> Channel<T> {
    /// Bounded channel with the default capacity
    pub fn new() -> SelectResult<Self> {
        Self::with_config(ChannelConfig::default())
    }

    /// Bounded channel; `capacity` is raised to 1 if zero
    pub fn bounded(capacity: usize) -> SelectResult<Self> {
        Self::with_config(ChannelConfig::new().capacity(capacity))
    }

    pub fn unbounded() -> SelectResult<Self> {
        Self::with_config(ChannelConfig::new().unbounded())
    }

    /// Fails only if the eventfd cannot be created
    pub fn with_config(config: ChannelConfig) -> SelectResult<Self> {
        let capacity = config.capacity.map(|n| n.max(1));
        let queue = match capacity {
            Some(n) => VecDeque::with_capacity(n),
            None => VecDeque::new(),
        };
        Ok(Self {
            inner: Arc::new(ChannelInner {
                state: SpinLock::new(ChannelState { queue, closed: false }),
                capacity,
                put_spins: config.put_spins,
                ready: ReadinessFd::new()?,
                space: SpaceSignal::new(),
            }),
        })
    }

    /// Enqueue `value`, blocking while the channel is full.
    ///
    /// Fails with `Closed` if the channel is (or becomes, while waiting)
    /// closed.
    pub fn put(&self, value: T) -> Result<(), PutError<T>> {
        self.put_until(value, None)
    }

    /// Like `put`, giving up with `Timeout` after `timeout`.
    pub fn put_timeout(&self, value: T, timeout: Duration) -> Result<(), PutError<T>> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.put_until(value, Some(deadline)),
            None => self.put_until(value, None),
        }
    }

    /// Enqueue without blocking; `Full` hands the value back.
    pub fn try_put(&self, value: T) -> Result<(), PutError<T>> {
        self.push(value)
    }

    fn put_until(&self, mut value: T, deadline: Option<Instant>) -> Result<(), PutError<T>> {
        let mut spins = 0u32;
        loop {
            // Snapshot before the fullness check, see parking.rs
            let seen = self.inner.space.snapshot();
            match self.push(value) {
                Err(PutError::Full(back)) => value = back,
                done => return done,
            }

            if spins < self.inner.put_spins {
                spins += 1;
                std::hint::spin_loop();
                continue;
            }

            let timeout = match deadline {
                None => None,
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(PutError::Timeout(value));
                    }
                    Some(deadline - now)
                }
            };
            self.inner.space.wait(seen, timeout);
        }
    }

    fn push(&self, value: T) -> Result<(), PutError<T>> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(PutError::Closed(value));
        }
        if let Some(cap) = self.inner.capacity {
            if state.queue.len() >= cap {
                return Err(PutError::Full(value));
            }
        }

        // Claimers need the lock too, so signalling before the push is not
        // observable as an empty claim.
        if let Err(errno) = self.inner.ready.signal() {
            return Err(PutError::Os(value, errno));
        }
        state.queue.push_back(value);
        Ok(())
    }

    /// Claim one item without blocking.
    ///
    /// `None` means the buffer was empty at the instant of the attempt, which
    /// for a selector case means another observer won the race. On success
    /// the readiness counter is decremented exactly once.
    pub fn try_take(&self) -> Option<T> {
        let value = {
            let mut state = self.inner.state.lock();
            let value = state.queue.pop_front()?;
            if !self.inner.ready.acknowledge() {
                // Counter was already behind the buffer. Never over-drain.
                kwarn!("channel fd {}: readiness counter behind buffer", self.inner.ready.fd());
            }
            value
        };

        if self.inner.capacity.is_some() {
            self.inner.space.notify_all();
        }
        Some(value)
    }

    /// Refuse further puts and wake parked producers.
    ///
    /// Items already buffered stay claimable.
    pub fn close(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
        }
        ktrace!("channel fd {} closed", self.inner.ready.fd());
        self.inner.space.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Items currently buffered (unclaimed)
    pub fn len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().queue.is_empty()
    }

    /// `None` for unbounded channels
    pub fn capacity(&self) -> Option<usize> {
        self.inner.capacity
    }

    /// The descriptor that is readable while an item is pending.
    ///
    /// Stable for the channel's lifetime; it can be added to any epoll set.
    pub fn readiness_fd(&self) -> BorrowedFd<'_> {
        self.inner.ready.as_fd()
    }

    pub fn raw_fd(&self) -> RawFd {
        self.inner.ready.fd()
    }

    /// Whether two handles refer to the same channel
    pub fn same_channel(&self, other: &Channel<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Channel {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> AsFd for Channel<T> {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.readiness_fd()
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("fd", &self.raw_fd())
            .field("len", &self.len())
            .field("capacity", &self.inner.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}
