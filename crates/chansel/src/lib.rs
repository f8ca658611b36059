//! # chansel - Go-style channels and select
//!
//! Typed channels plus a multi-way `select` that waits on several channels
//! (and, optionally, a non-blocking default branch) and fires exactly one
//! ready case per call.
//!
//! ## Quick Start
//!
//! ```ignore
//! use chansel::{Channel, DefaultCase, Selected, Selector};
//! use std::cell::Cell;
//!
//! let jobs = Channel::<u32>::bounded(16)?;
//! let quit = Channel::<()>::bounded(1)?;
//! let done = Cell::new(false);
//!
//! let mut sel = Selector::builder()
//!     .recv(&jobs, |job| println!("job {}", job))
//!     .recv(&quit, |_| done.set(true))
//!     .build()?;
//!
//! // for { select { ... } }
//! while !done.get() {
//!     sel.select()?;
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  put   ┌──────────────────────────────┐
//! │  producers   │ ─────► │ Channel<T>                   │
//! └──────────────┘        │  VecDeque<T> + eventfd count │
//!                         └──────────────┬───────────────┘
//!                                        │ readable while count > 0
//!                 ┌──────────────────────┼──────────────────────┐
//!                 ▼                      ▼                      ▼
//!         ┌─────────────┐        ┌─────────────┐        ┌─────────────┐
//!         │ Selector A  │        │ Selector B  │        │ other epoll │
//!         │ (own epoll) │        │ (own epoll) │        │    loops    │
//!         └─────────────┘        └─────────────┘        └─────────────┘
//!            try_take: exactly one observer claims each item
//! ```
//!
//! ## Semantics
//!
//! - `select()` without a default blocks the calling thread until a case is
//!   ready; with a default it never blocks.
//! - A case reported ready may lose the claim to another selector; that
//!   returns `Selected::Missed` and runs no handler.
//! - No priority among simultaneously ready cases.
//! - Bounded channels block `put` while full; `try_put` hands the value back.

pub use chansel_core::error::{PutError, SelectError, SelectResult};
pub use chansel_core::kprint::{set_log_level, LogLevel};

pub use chansel_runtime::{
    Case, Channel, ChannelConfig, DefaultCase, Dispatch, Poller, ReadyCase, SelectCase, Selected,
    Selector, SelectorBuilder,
};

/// Build a receive case
pub fn case<T, F>(channel: &Channel<T>, handler: F) -> Case<T, F>
where
    F: FnMut(T),
{
    Case::new(channel, handler)
}

/// Build a default case
pub fn default_case<F>(handler: F) -> DefaultCase<F>
where
    F: FnMut(),
{
    DefaultCase::new(handler)
}
