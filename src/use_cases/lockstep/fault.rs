// State shared between the simulation thread and the network tasks.

use crate::use_cases::LockstepError;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// First-error-wins fault flag. Network tasks raise; the simulation thread
/// checks it once per tick and takes the error during teardown.
#[derive(Debug, Default)]
pub struct Fault {
    raised: AtomicBool,
    closing: AtomicBool,
    first: Mutex<Option<LockstepError>>,
}

impl Fault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self, error: LockstepError) {
        if self.closing.load(Ordering::Acquire) && error.is_expected_during_shutdown() {
            debug!(error = %error, "ignoring hang-up during teardown");
            return;
        }

        let mut first = self.first.lock().unwrap_or_else(PoisonError::into_inner);
        if first.is_some() {
            debug!(error = %error, "later fault suppressed");
            return;
        }
        warn!(error = %error, "lockstep fault raised");
        *first = Some(error);
        self.raised.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// From here on, peers hanging up is no longer an error.
    pub fn begin_teardown(&self) {
        self.closing.store(true, Ordering::Release);
    }

    pub fn take(&self) -> Option<LockstepError> {
        self.first
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Messages received for the current tick, keyed by sender name.
#[derive(Debug, Default)]
pub struct TickMessages {
    inner: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl TickMessages {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, name: &str, body: Vec<u8>) {
        if self.lock().insert(name.to_string(), body).is_some() {
            warn!(peer = %name, "second message in one tick replaced the first");
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn take(&self) -> BTreeMap<String, Vec<u8>> {
        std::mem::take(&mut *self.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn when_several_faults_are_raised_then_the_first_is_kept() {
        let fault = Fault::new();
        assert!(!fault.is_raised());
        fault.raise(LockstepError::UnexpectedMessage);
        fault.raise(LockstepError::UnknownMessage);
        assert!(fault.is_raised());
        assert!(matches!(fault.take(), Some(LockstepError::UnexpectedMessage)));
        assert!(fault.take().is_none());
    }

    #[test]
    fn when_tearing_down_then_hang_ups_are_ignored_but_real_errors_are_not() {
        let fault = Fault::new();
        fault.begin_teardown();
        fault.raise(io::Error::from(io::ErrorKind::ConnectionReset).into());
        assert!(!fault.is_raised());
        fault.raise(LockstepError::UnableToDecodeHeader);
        assert!(matches!(fault.take(), Some(LockstepError::UnableToDecodeHeader)));
    }

    #[test]
    fn when_not_tearing_down_then_hang_ups_are_faults() {
        let fault = Fault::new();
        fault.raise(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        assert!(fault.is_raised());
    }

    #[test]
    fn when_messages_are_taken_then_they_come_out_in_name_order() {
        let messages = TickMessages::new();
        messages.insert("2", vec![2]);
        messages.insert("0", vec![0]);
        messages.insert("1", vec![]);
        assert_eq!(messages.len(), 3);
        let taken: Vec<_> = messages.take().into_keys().collect();
        assert_eq!(taken, vec!["0", "1", "2"]);
        assert!(messages.is_empty());
    }
}
