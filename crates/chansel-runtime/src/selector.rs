//! # Selector - Go-style `for { select { ... } }`
//!
//! A selector is built once from an ordered list of cases and then polled
//! repeatedly. Building registers every case's readiness descriptor with a
//! private epoll set, tagged with the case's index; dropping removes them.
//!
//! Each `select()` is one wait-and-dispatch cycle:
//!
//! ```text
//!            ┌─────────── default case? ───────────┐
//!            │ yes                                  │ no
//!            ▼                                      ▼
//!   epoll_wait(timeout = 0)                epoll_wait(timeout = ∞ / d)
//!            │                                      │
//!     nothing ready ──► default handler      nothing ready ──► TimedOut
//!            │                                      │
//!            └──────────────► ready tag = case index ◄┘
//!                                   │
//!                          case.dispatch()
//!                     claim won ──► handler(value)      => Case(i)
//!                     claim lost ──► no handler         => Missed(i)
//! ```
//!
//! At most one value is consumed and at most one handler runs per call.
//! When several cases are ready, epoll decides which one is reported; there
//! is no priority among cases.
//!
//! The wait blocks the calling OS thread. Run one selector per thread (or per
//! green thread on a runtime that parks OS threads) to wait concurrently.

use std::fmt;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::time::{Duration, Instant};

use chansel_core::error::{SelectError, SelectResult};
use chansel_core::{kdebug, ktrace};

use crate::case::{Case, DefaultCase, Dispatch, ReadyCase, SelectCase};
use crate::channel::Channel;
use crate::poller::Poller;

/// What a single `select()` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selected {
    /// Case `i` claimed a value and its handler ran
    Case(usize),
    /// Nothing was ready; the default handler ran
    Default,
    /// Case `i` was reported ready but another observer claimed the value
    /// first. No handler ran; select again if progress is needed.
    Missed(usize),
    /// `select_timeout` expired with nothing ready
    TimedOut,
}

impl Selected {
    /// Whether some handler (case or default) ran
    pub fn fired(&self) -> bool {
        matches!(self, Selected::Case(_) | Selected::Default)
    }
}

type BoxedCase<'a> = Box<dyn SelectCase + 'a>;
type BoxedHandler<'a> = Box<dyn FnMut() + 'a>;

pub struct Selector<'a> {
    /// Index == epoll tag
    cases: Vec<BoxedCase<'a>>,
    default: Option<BoxedHandler<'a>>,
    poller: Poller,
}

/// Collects cases in order; `build` registers them.
pub struct SelectorBuilder<'a> {
    cases: Vec<BoxedCase<'a>>,
    default: Option<BoxedHandler<'a>>,
    defaults_seen: usize,
}

impl<'a> SelectorBuilder<'a> {
    pub fn new() -> Self {
        Self {
            cases: Vec::new(),
            default: None,
            defaults_seen: 0,
        }
    }

    /// Add any case; its index is the number of cases added before it
    pub fn case<C>(mut self, case: C) -> Self
    where
        C: SelectCase + 'a,
    {
        self.cases.push(Box::new(case));
        self
    }

    /// Shorthand for `case(Case::new(channel, handler))`
    pub fn recv<T, F>(self, channel: &Channel<T>, handler: F) -> Self
    where
        T: 'a,
        F: FnMut(T) + 'a,
    {
        self.case(Case::new(channel, handler))
    }

    /// Shorthand for `case(ReadyCase::new(fd, handler))`
    pub fn ready<F>(self, fd: BorrowedFd<'a>, handler: F) -> Self
    where
        F: FnMut() + 'a,
    {
        self.case(ReadyCase::new(fd, handler))
    }

    /// Set the default case. A second call makes `build` fail.
    pub fn default_case<F>(mut self, case: DefaultCase<F>) -> Self
    where
        F: FnMut() + 'a,
    {
        self.defaults_seen += 1;
        if self.default.is_none() {
            self.default = Some(Box::new(case.into_handler()));
        }
        self
    }

    /// Register every case and arm the selector.
    ///
    /// Errors: `DuplicateDefault`, `NoCases` (no case and no default),
    /// `AlreadyRegistered` (two cases on one descriptor), `Register`,
    /// `PollerCreate`. Nothing stays registered after a failure.
    pub fn build(self) -> SelectResult<Selector<'a>> {
        if self.defaults_seen > 1 {
            return Err(SelectError::DuplicateDefault);
        }
        if self.cases.is_empty() && self.default.is_none() {
            return Err(SelectError::NoCases);
        }

        let mut poller = Poller::new()?;
        for (index, case) in self.cases.iter().enumerate() {
            poller.register(case.readiness(), index as u64)?;
        }

        kdebug!(
            "selector armed: {} case(s), default={}",
            self.cases.len(),
            self.default.is_some()
        );

        Ok(Selector {
            cases: self.cases,
            default: self.default,
            poller,
        })
    }
}

impl<'a> Default for SelectorBuilder<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Selector<'a> {
    pub fn builder() -> SelectorBuilder<'a> {
        SelectorBuilder::new()
    }

    /// One wait-and-dispatch cycle.
    ///
    /// Without a default case this blocks until some case is ready. With one
    /// it never blocks.
    pub fn select(&mut self) -> SelectResult<Selected> {
        self.select_with(None)
    }

    /// Like `select`, but gives up with `TimedOut` after `timeout`.
    ///
    /// A default case still wins immediately when nothing is ready.
    pub fn select_timeout(&mut self, timeout: Duration) -> SelectResult<Selected> {
        self.select_with(Some(timeout))
    }

    fn select_with(&mut self, timeout: Option<Duration>) -> SelectResult<Selected> {
        let tag = if self.default.is_some() {
            self.poller.wait_one(Some(Duration::ZERO))?
        } else {
            match timeout {
                None => self.poller.wait_one(None)?,
                Some(timeout) => self.wait_until(timeout)?,
            }
        };

        let Some(tag) = tag else {
            return Ok(match self.default.as_mut() {
                Some(handler) => {
                    handler();
                    Selected::Default
                }
                None => Selected::TimedOut,
            });
        };

        let index = tag as usize;
        match self.cases[index].dispatch() {
            Dispatch::Fired => Ok(Selected::Case(index)),
            Dispatch::Missed => {
                ktrace!("selector: case {} lost the claim race", index);
                Ok(Selected::Missed(index))
            }
        }
    }

    /// Bounded wait that survives early returns (EINTR, ms rounding)
    fn wait_until(&self, timeout: Duration) -> SelectResult<Option<u64>> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.poller.wait_one(None);
        };
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if let Some(tag) = self.poller.wait_one(Some(remaining))? {
                return Ok(Some(tag));
            }
            if remaining.is_zero() || Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }

    /// Number of non-default cases
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Descriptors currently registered; equals `len()` while the selector
    /// is alive
    pub fn registered(&self) -> usize {
        self.poller.registered()
    }
}

impl<'a> Drop for Selector<'a> {
    fn drop(&mut self) {
        for case in &self.cases {
            self.poller.deregister(case.readiness());
        }
        kdebug!("selector dropped, {} registration(s) left", self.poller.registered());
    }
}

impl<'a> fmt::Debug for Selector<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fds: Vec<i32> = self.cases.iter().map(|c| c.readiness().as_raw_fd()).collect();
        f.debug_struct("Selector")
            .field("fds", &fds)
            .field("has_default", &self.has_default())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_queue::SegQueue;
    use std::cell::{Cell, RefCell};
    use std::io::{Read, Write};
    use std::os::fd::AsFd;
    use std::os::unix::net::UnixStream;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_single_case_fires_once() {
        let a = Channel::bounded(4).unwrap();
        a.put(1).unwrap();

        let got = RefCell::new(Vec::new());
        {
            let mut sel = Selector::builder()
                .recv(&a, |v| got.borrow_mut().push(v))
                .build()
                .unwrap();
            assert_eq!(sel.select().unwrap(), Selected::Case(0));
        }
        assert_eq!(*got.borrow(), vec![1]);
        assert_eq!(a.try_take(), None);
    }

    #[test]
    fn test_default_then_channel() {
        let a = Channel::<i32>::bounded(4).unwrap();
        let b = Channel::<i32>::bounded(4).unwrap();
        let log = RefCell::new(Vec::new());

        let mut sel = Selector::builder()
            .recv(&a, |v| log.borrow_mut().push(format!("a:{}", v)))
            .recv(&b, |v| log.borrow_mut().push(format!("b:{}", v)))
            .default_case(DefaultCase::new(|| log.borrow_mut().push("default".to_string())))
            .build()
            .unwrap();

        assert_eq!(sel.select().unwrap(), Selected::Default);
        b.put(5).unwrap();
        assert_eq!(sel.select().unwrap(), Selected::Case(1));
        drop(sel);

        assert_eq!(*log.borrow(), vec!["default".to_string(), "b:5".to_string()]);
    }

    #[test]
    fn test_default_never_blocks() {
        let a = Channel::<u8>::bounded(1).unwrap();
        let hits = Cell::new(0);
        let mut sel = Selector::builder()
            .recv(&a, |_| panic!("nothing was sent"))
            .default_case(DefaultCase::new(|| hits.set(hits.get() + 1)))
            .build()
            .unwrap();

        let start = Instant::now();
        assert_eq!(sel.select().unwrap(), Selected::Default);
        assert!(start.elapsed() < Duration::from_millis(100));

        // Timeout is irrelevant when a default exists
        assert_eq!(sel.select_timeout(Duration::from_secs(5)).unwrap(), Selected::Default);
        assert!(start.elapsed() < Duration::from_millis(200));
        drop(sel);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_blocks_until_put() {
        let a = Channel::bounded(1).unwrap();
        let producer = {
            let a = a.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                a.put(99u32).unwrap();
            })
        };

        let got = Cell::new(0);
        let mut sel = Selector::builder().recv(&a, |v| got.set(v)).build().unwrap();
        let start = Instant::now();
        assert_eq!(sel.select().unwrap(), Selected::Case(0));
        assert!(start.elapsed() >= Duration::from_millis(40));
        drop(sel);

        producer.join().unwrap();
        assert_eq!(got.get(), 99);
    }

    #[test]
    fn test_select_timeout_expires() {
        let a = Channel::<()>::bounded(1).unwrap();
        let mut sel = Selector::builder().recv(&a, |_| {}).build().unwrap();

        let start = Instant::now();
        assert_eq!(sel.select_timeout(Duration::from_millis(30)).unwrap(), Selected::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(30));

        a.put(()).unwrap();
        assert_eq!(sel.select_timeout(Duration::from_millis(30)).unwrap(), Selected::Case(0));
    }

    #[test]
    fn test_heterogeneous_cases() {
        let names = Channel::<String>::unbounded().unwrap();
        let counts = Channel::<u64>::unbounded().unwrap();
        let name = RefCell::new(String::new());
        let total = Cell::new(0u64);

        let mut sel = Selector::builder()
            .recv(&names, |s| name.borrow_mut().push_str(&s))
            .recv(&counts, |n| total.set(total.get() + n))
            .build()
            .unwrap();

        names.put("chan".to_string()).unwrap();
        counts.put(40).unwrap();
        counts.put(2).unwrap();

        let mut fired = 0;
        while fired < 3 {
            if sel.select().unwrap().fired() {
                fired += 1;
            }
        }
        drop(sel);
        assert_eq!(name.borrow().as_str(), "chan");
        assert_eq!(total.get(), 42);
    }

    #[test]
    fn test_fifo_through_select_loop() {
        let ch = Channel::bounded(8).unwrap();
        let producer = {
            let ch = ch.clone();
            thread::spawn(move || {
                for i in 0..500u32 {
                    ch.put(i).unwrap();
                }
            })
        };

        let got = RefCell::new(Vec::new());
        let mut sel = Selector::builder()
            .recv(&ch, |v| got.borrow_mut().push(v))
            .build()
            .unwrap();
        while got.borrow().len() < 500 {
            sel.select().unwrap();
        }
        drop(sel);
        producer.join().unwrap();

        assert_eq!(*got.borrow(), (0..500).collect::<Vec<_>>());
    }

    fn run_competing_selectors(items: usize, selectors: usize) -> Vec<usize> {
        let ch = Channel::unbounded().unwrap();
        for i in 0..items {
            ch.put(i).unwrap();
        }

        let delivered = Arc::new(SegQueue::new());
        let barrier = Arc::new(Barrier::new(selectors));
        let handles: Vec<_> = (0..selectors)
            .map(|_| {
                let ch = ch.clone();
                let delivered = Arc::clone(&delivered);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let mut sel = Selector::builder()
                        .recv(&ch, |v| delivered.push(v))
                        .build()
                        .unwrap();
                    barrier.wait();
                    sel.select_timeout(Duration::from_millis(200)).unwrap()
                })
            })
            .collect();

        for h in handles {
            let outcome = h.join().unwrap();
            assert!(matches!(outcome, Selected::Case(0) | Selected::Missed(0) | Selected::TimedOut));
        }

        let mut out = Vec::new();
        while let Some(v) = delivered.pop() {
            out.push(v);
        }
        out.sort_unstable();
        out
    }

    #[test]
    fn test_exactly_once_fewer_items_than_selectors() {
        let out = run_competing_selectors(3, 8);
        assert_eq!(out, vec![0, 1, 2]);
    }

    #[test]
    fn test_exactly_once_more_items_than_selectors() {
        let out = run_competing_selectors(20, 6);
        assert_eq!(out.len(), 6);
        out.windows(2).for_each(|w| assert_ne!(w[0], w[1]));
    }

    #[test]
    fn test_drop_deregisters() {
        let a = Channel::<u8>::bounded(1).unwrap();
        let b = Channel::<u8>::bounded(1).unwrap();

        let sel = Selector::builder().recv(&a, |_| {}).recv(&b, |_| {}).build().unwrap();
        assert_eq!(sel.len(), 2);
        assert_eq!(sel.registered(), 2);
        drop(sel);

        // Same descriptors register cleanly again, repeatedly
        for _ in 0..3 {
            let sel = Selector::builder().recv(&a, |_| {}).recv(&b, |_| {}).build().unwrap();
            assert_eq!(sel.registered(), 2);
        }
    }

    #[test]
    fn test_build_errors() {
        let a = Channel::<u8>::bounded(1).unwrap();

        let err = Selector::builder().build().unwrap_err();
        assert_eq!(err, SelectError::NoCases);

        let err = Selector::builder()
            .recv(&a, |_| {})
            .default_case(DefaultCase::new(|| {}))
            .default_case(DefaultCase::new(|| {}))
            .build()
            .unwrap_err();
        assert_eq!(err, SelectError::DuplicateDefault);

        let err = Selector::builder()
            .recv(&a, |_| {})
            .recv(&a.clone(), |_| {})
            .build()
            .unwrap_err();
        assert_eq!(err, SelectError::AlreadyRegistered(a.raw_fd()));

        let file = std::fs::File::open(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml")).unwrap();
        let err = Selector::builder()
            .recv(&a, |_| {})
            .ready(file.as_fd(), || {})
            .build()
            .unwrap_err();
        assert!(matches!(err, SelectError::Register { fd, .. } if fd == file.as_raw_fd()));

        // A failed build leaves nothing behind
        let sel = Selector::builder().recv(&a, |_| {}).build().unwrap();
        assert_eq!(sel.registered(), 1);
    }

    #[test]
    fn test_default_only_selector() {
        let hits = Cell::new(0);
        let mut sel = Selector::builder()
            .default_case(DefaultCase::new(|| hits.set(hits.get() + 1)))
            .build()
            .unwrap();
        assert!(sel.is_empty());
        assert!(sel.has_default());
        assert_eq!(sel.select().unwrap(), Selected::Default);
        drop(sel);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_socket_and_channel_share_wait_set() {
        let (mut tx, rx) = UnixStream::pair().unwrap();
        let ch = Channel::<&str>::bounded(2).unwrap();
        let events = RefCell::new(Vec::new());
        let mut reader = rx.try_clone().unwrap();

        let mut sel = Selector::builder()
            .recv(&ch, |s| events.borrow_mut().push(s.to_string()))
            .ready(rx.as_fd(), || {
                let mut buf = [0u8; 4];
                let n = reader.read(&mut buf).unwrap();
                events.borrow_mut().push(format!("socket:{}", n));
            })
            .build()
            .unwrap();

        tx.write_all(b"ping").unwrap();
        assert_eq!(sel.select().unwrap(), Selected::Case(1));

        ch.put("msg").unwrap();
        assert_eq!(sel.select().unwrap(), Selected::Case(0));
        drop(sel);

        assert_eq!(*events.borrow(), vec!["socket:4".to_string(), "msg".to_string()]);
    }
}
