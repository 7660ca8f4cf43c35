//! Single-writer access to the operator's transaction sequence number.

use crate::{Error, Result};
use std::sync::Mutex;

/// The operator's next transaction sequence number.
///
/// Every write runs inside [`SignerSequence::with_next`], which holds the lock
/// from submission until confirmation. Two writes from the same identity can
/// therefore never race on a sequence number, even if callers were to run on
/// several threads.
#[derive(Debug, Default)]
pub struct SignerSequence {
    next: Mutex<Option<u64>>,
}

impl SignerSequence {
    /// Creates an unsynchronised sequence; the first write syncs from chain.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: Mutex::new(None),
        }
    }

    /// Returns the cached next sequence number, if synchronised.
    #[must_use]
    pub fn peek(&self) -> Option<u64> {
        self.next.lock().ok().and_then(|guard| *guard)
    }

    /// Forgets the cached number so the next write re-syncs.
    pub fn invalidate(&self) {
        if let Ok(mut guard) = self.next.lock() {
            *guard = None;
        }
    }

    /// Runs `write` with the next sequence number.
    ///
    /// `sync` is called to fetch the number from chain when none is cached.
    /// On success the cached number advances by one; on failure it is
    /// dropped, because a timed-out write may or may not have consumed it.
    ///
    /// # Errors
    ///
    /// Returns the error from `sync` or `write`, or
    /// [`Error::OperationFailed`] if the lock is poisoned.
    pub fn with_next<T, S, W>(&self, sync: S, write: W) -> Result<T>
    where
        S: FnOnce() -> Result<u64>,
        W: FnOnce(u64) -> Result<T>,
    {
        let mut guard = self.next.lock().map_err(|e| Error::OperationFailed {
            operation: "signer_lock".to_string(),
            cause: e.to_string(),
        })?;

        let nonce = match *guard {
            Some(nonce) => nonce,
            None => {
                let synced = sync()?;
                tracing::debug!(nonce = synced, "Synchronised signer sequence");
                synced
            },
        };

        match write(nonce) {
            Ok(value) => {
                *guard = Some(nonce.saturating_add(1));
                Ok(value)
            },
            Err(err) => {
                *guard = None;
                Err(err)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_syncs_once_then_increments() {
        let seq = SignerSequence::new();
        let syncs = Cell::new(0);
        let sync = || {
            syncs.set(syncs.get() + 1);
            Ok(41)
        };

        let first = seq.with_next(sync, Ok).expect("first write");
        let second = seq.with_next(sync, Ok).expect("second write");
        assert_eq!((first, second), (41, 42));
        assert_eq!(syncs.get(), 1);
        assert_eq!(seq.peek(), Some(43));
    }

    #[test]
    fn test_failure_forces_resync() {
        let seq = SignerSequence::new();
        seq.with_next(|| Ok(5), Ok).expect("write");

        let failed: Result<u64> = seq.with_next(
            || Ok(0),
            |_| Err(Error::Timeout {
                operation: "receipt".to_string(),
                waited_ms: 10,
            }),
        );
        assert!(failed.is_err());
        assert_eq!(seq.peek(), None);

        let resynced = seq.with_next(|| Ok(7), Ok).expect("resync");
        assert_eq!(resynced, 7);
    }

    #[test]
    fn test_sync_error_propagates() {
        let seq = SignerSequence::new();
        let result: Result<u64> = seq.with_next(
            || Err(Error::InvalidInput("no address".to_string())),
            Ok,
        );
        assert!(result.is_err());
        assert_eq!(seq.peek(), None);
    }

    #[test]
    fn test_invalidate() {
        let seq = SignerSequence::new();
        seq.with_next(|| Ok(1), Ok).expect("write");
        seq.invalidate();
        assert_eq!(seq.peek(), None);
    }
}
