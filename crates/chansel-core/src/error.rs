//! Error types for channels and select

use core::fmt;

/// Result type for selector and poller operations
pub type SelectResult<T> = Result<T, SelectError>;

/// Errors raised while building or driving a selector
///
/// Race losses are not errors; they surface as `Selected::Missed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectError {
    /// epoll_ctl(ADD) rejected a descriptor (invalid fd, resource limit)
    Register { fd: i32, errno: i32 },

    /// The descriptor is already part of this wait set
    AlreadyRegistered(i32),

    /// epoll_create failed
    PollerCreate(i32),

    /// epoll_wait failed
    Wait(i32),

    /// eventfd creation failed
    EventFd(i32),

    /// More than one default case was supplied
    DuplicateDefault,

    /// A selector needs at least one case or a default
    NoCases,
}

impl fmt::Display for SelectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectError::Register { fd, errno } => {
                write!(f, "failed to register fd {}: errno {}", fd, errno)
            }
            SelectError::AlreadyRegistered(fd) => write!(f, "fd {} already registered", fd),
            SelectError::PollerCreate(errno) => write!(f, "epoll_create failed: errno {}", errno),
            SelectError::Wait(errno) => write!(f, "epoll_wait failed: errno {}", errno),
            SelectError::EventFd(errno) => write!(f, "eventfd failed: errno {}", errno),
            SelectError::DuplicateDefault => write!(f, "selector has more than one default case"),
            SelectError::NoCases => write!(f, "selector has no cases"),
        }
    }
}

impl std::error::Error for SelectError {}

/// Error returned by the `put` family; always hands the value back
#[derive(Clone, PartialEq, Eq)]
pub enum PutError<T> {
    /// Bounded channel is full (`try_put` only)
    Full(T),

    /// Deadline passed while waiting for space (`put_timeout` only)
    Timeout(T),

    /// Channel was closed
    Closed(T),

    /// Signalling the readiness descriptor failed; the value was not enqueued
    Os(T, i32),
}

impl<T> PutError<T> {
    /// Recover the value that could not be sent
    pub fn into_inner(self) -> T {
        match self {
            PutError::Full(v) | PutError::Timeout(v) | PutError::Closed(v) | PutError::Os(v, _) => v,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, PutError::Full(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, PutError::Closed(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PutError::Timeout(_))
    }
}

// Manual impl so T does not need Debug.
impl<T> fmt::Debug for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PutError::Full(_) => write!(f, "Full(..)"),
            PutError::Timeout(_) => write!(f, "Timeout(..)"),
            PutError::Closed(_) => write!(f, "Closed(..)"),
            PutError::Os(_, errno) => write!(f, "Os(.., {})", errno),
        }
    }
}

impl<T> fmt::Display for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PutError::Full(_) => write!(f, "channel full"),
            PutError::Timeout(_) => write!(f, "timed out waiting for channel space"),
            PutError::Closed(_) => write!(f, "channel closed"),
            PutError::Os(_, errno) => write!(f, "readiness signal failed: errno {}", errno),
        }
    }
}

impl<T> std::error::Error for PutError<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = SelectError::Register { fd: 7, errno: 9 };
        assert_eq!(format!("{}", e), "failed to register fd 7: errno 9");

        let e = SelectError::DuplicateDefault;
        assert_eq!(format!("{}", e), "selector has more than one default case");
    }

    #[test]
    fn test_put_error_returns_value() {
        let e = PutError::Full(String::from("payload"));
        assert!(e.is_full());
        assert_eq!(e.into_inner(), "payload");

        let e = PutError::Os(3u8, 11);
        assert_eq!(format!("{}", e), "readiness signal failed: errno 11");
        assert_eq!(format!("{:?}", e), "Os(.., 11)");
        assert_eq!(e.into_inner(), 3);
    }

    #[test]
    fn test_put_error_kind_checks() {
        assert!(PutError::Closed(()).is_closed());
        assert!(PutError::Timeout(()).is_timeout());
        assert!(!PutError::Timeout(()).is_full());
    }
}
