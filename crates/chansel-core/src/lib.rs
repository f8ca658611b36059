//! # chansel-core
//!
//! Platform-agnostic building blocks shared by the chansel runtime.
//!
//! This crate performs no OS calls. The eventfd/epoll machinery lives in
//! `chansel-runtime`.
//!
//! ## Modules
//!
//! - `error` - Selector and channel error types
//! - `spinlock` - Lock guarding a channel's buffer and readiness counter
//! - `kprint` - Leveled stderr logging macros
//! - `env` - Environment variable utilities

pub mod error;
pub mod spinlock;
pub mod kprint;
pub mod env;

pub use error::{PutError, SelectError, SelectResult};
pub use spinlock::{SpinLock, SpinLockGuard};
pub use env::{env_get, env_get_bool, env_get_opt};
