//! # chansel-runtime
//!
//! Linux implementation of chansel channels and select.
//!
//! This crate provides:
//! - `ReadinessFd` - eventfd (semaphore mode) counting a channel's pending items
//! - `Poller` - level-triggered epoll wait set returning one ready tag
//! - `SpaceSignal` - futex parking for producers on a full channel
//! - `Channel<T>` - typed MPMC FIFO with an exactly-once claim
//! - `Case` / `ReadyCase` / `DefaultCase` - select cases
//! - `Selector` - builds the wait set once, dispatches one case per `select()`
//!
//! A blocking `select()` parks the calling OS thread inside `epoll_wait`.
//! It does not yield to any user-space scheduler.

// eventfd, epoll and futex are Linux-only
cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        pub mod eventfd;
        pub mod poller;
        pub mod parking;
    } else {
        compile_error!("chansel-runtime requires Linux (eventfd, epoll, futex)");
    }
}

pub mod config;
pub mod channel;
pub mod case;
pub mod selector;

// Re-exports
pub use config::ChannelConfig;
pub use eventfd::ReadinessFd;
pub use poller::Poller;
pub use channel::Channel;
pub use case::{Case, DefaultCase, Dispatch, ReadyCase, SelectCase};
pub use selector::{Selected, Selector, SelectorBuilder};
