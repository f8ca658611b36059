//! Select cases
//!
//! A case pairs a readiness descriptor with a handler. Cases of different
//! value types are erased behind [`SelectCase`], which is all the selector
//! sees: "which fd do I watch" and "try to fire now".
//!
//! - [`Case`] - channel + `FnMut(T)`, fires only if it wins the claim
//! - [`ReadyCase`] - any borrowed fd (socket, pipe, timerfd) + `FnMut()`
//! - [`DefaultCase`] - no fd, fired by a selector when nothing is ready

use std::os::fd::BorrowedFd;

use crate::channel::Channel;

/// Outcome of one dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The handler ran
    Fired,
    /// Another observer claimed the item first; the handler did not run
    Missed,
}

/// Type-erased case as stored by a selector.
///
/// `readiness` must return the same descriptor for the lifetime of the case;
/// the selector registers it once at build time and removes it on drop.
pub trait SelectCase {
    fn readiness(&self) -> BorrowedFd<'_>;

    /// Called after the readiness descriptor was reported readable
    fn dispatch(&mut self) -> Dispatch;
}

/// Receive case on a channel.
///
/// Holds its own handle to the channel, so the channel outlives any
/// selector built from this case.
pub struct Case<T, F> {
    channel: Channel<T>,
    handler: F,
}

impl<T, F> Case<T, F>
where
    F: FnMut(T),
{
    pub fn new(channel: &Channel<T>, handler: F) -> Self {
        Self {
            channel: channel.clone(),
            handler,
        }
    }

    pub fn channel(&self) -> &Channel<T> {
        &self.channel
    }
}

impl<T, F> SelectCase for Case<T, F>
where
    F: FnMut(T),
{
    fn readiness(&self) -> BorrowedFd<'_> {
        self.channel.readiness_fd()
    }

    fn dispatch(&mut self) -> Dispatch {
        match self.channel.try_take() {
            Some(value) => {
                (self.handler)(value);
                Dispatch::Fired
            }
            None => Dispatch::Missed,
        }
    }
}

/// Readiness case on an arbitrary descriptor.
///
/// The handler is responsible for consuming the readiness (accept, read,
/// drain); the wait set is level-triggered, so an fd left readable fires
/// again on the next select.
pub struct ReadyCase<'fd, F> {
    fd: BorrowedFd<'fd>,
    handler: F,
}

impl<'fd, F> ReadyCase<'fd, F>
where
    F: FnMut(),
{
    pub fn new(fd: BorrowedFd<'fd>, handler: F) -> Self {
        Self { fd, handler }
    }
}

impl<'fd, F> SelectCase for ReadyCase<'fd, F>
where
    F: FnMut(),
{
    fn readiness(&self) -> BorrowedFd<'_> {
        self.fd
    }

    fn dispatch(&mut self) -> Dispatch {
        (self.handler)();
        Dispatch::Fired
    }
}

/// Fallback branch: a handler and nothing else.
pub struct DefaultCase<F> {
    handler: F,
}

impl<F> DefaultCase<F>
where
    F: FnMut(),
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }

    pub(crate) fn into_handler(self) -> F {
        self.handler
    }
}
