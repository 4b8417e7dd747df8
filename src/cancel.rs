use std::sync::atomic::{AtomicBool, Ordering};

use crate::{Error, Result};

/// cancellation token polled by long-running operations
///
/// checked on entry and at i/o boundaries. a cancelled operation
/// unlinks any in-flight tempfile and surfaces [`Error::Cancelled`].
#[derive(Debug, Default)]
pub struct Cancellable(AtomicBool);

impl Cancellable {
    pub fn new() -> Self {
        Self::default()
    }

    /// request cancellation; observed at the next poll point
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// error out if cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// poll an optional token
pub(crate) fn check_cancelled(cancellable: Option<&Cancellable>) -> Result<()> {
    match cancellable {
        Some(c) => c.check(),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_token_passes() {
        let c = Cancellable::new();
        assert!(!c.is_cancelled());
        assert!(c.check().is_ok());
        assert!(check_cancelled(Some(&c)).is_ok());
        assert!(check_cancelled(None).is_ok());
    }

    #[test]
    fn test_cancelled_token_errors() {
        let c = Cancellable::new();
        c.cancel();
        assert!(c.is_cancelled());
        assert!(matches!(c.check(), Err(Error::Cancelled)));
        assert!(matches!(check_cancelled(Some(&c)), Err(Error::Cancelled)));
    }
}
