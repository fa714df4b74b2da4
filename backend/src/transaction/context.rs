use parking_lot::Mutex as FieldsMutex;
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use crate::error::AppError;

/// Per-request state handed to handlers.
///
/// The context is a bundle of shared handles, so cloning it is cheap and every
/// clone observes the same transaction and log fields.
pub struct RequestContext<T> {
    tx: Option<Tx<T>>,
    log_fields: LogFields,
}

impl<T> RequestContext<T> {
    pub fn new(log_fields: LogFields) -> Self {
        Self {
            tx: None,
            log_fields,
        }
    }

    /// Copy of this context whose transaction handle is `tx`.
    pub fn with_transaction(&self, tx: Tx<T>) -> Self {
        Self {
            tx: Some(tx),
            log_fields: self.log_fields.clone(),
        }
    }

    pub fn tx(&self) -> Option<&Tx<T>> {
        self.tx.as_ref()
    }

    /// Locks the request transaction.
    pub async fn transaction(&self) -> Result<MappedMutexGuard<'_, T>, AppError> {
        match &self.tx {
            Some(tx) => tx.lock().await,
            None => Err(AppError::InternalServerError(anyhow::anyhow!(
                "no transaction bound to this request"
            ))),
        }
    }

    pub fn log_fields(&self) -> &LogFields {
        &self.log_fields
    }
}

impl<T> Default for RequestContext<T> {
    fn default() -> Self {
        Self::new(LogFields::default())
    }
}

impl<T> Clone for RequestContext<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            log_fields: self.log_fields.clone(),
        }
    }
}

/// Shared handle to a live transaction.
///
/// The slot is emptied when the owning wrapper finishes the transaction; later
/// use of a retained clone fails instead of touching a closed transaction.
pub struct Tx<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> Tx<T> {
    pub(crate) fn new(tx: T) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(tx))),
        }
    }

    pub async fn lock(&self) -> Result<MappedMutexGuard<'_, T>, AppError> {
        let guard = self.slot.lock().await;
        MutexGuard::try_map(guard, |slot| slot.as_mut()).map_err(|_| {
            AppError::InternalServerError(anyhow::anyhow!("transaction already finished"))
        })
    }

    pub fn is_finished(&self) -> bool {
        match self.slot.try_lock() {
            Ok(slot) => slot.is_none(),
            Err(_) => false,
        }
    }

    /// Takes the transaction out of the slot, waiting for any holder that
    /// still has it locked. Every clone is finished afterwards.
    pub(crate) async fn take(&self) -> Option<T> {
        self.slot.lock().await.take()
    }

    pub fn same_transaction(&self, other: &Tx<T>) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl<T> Clone for Tx<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

/// Structured fields attached to the request's log line.
#[derive(Clone, Default)]
pub struct LogFields {
    fields: Arc<FieldsMutex<BTreeMap<&'static str, Duration>>>,
}

impl LogFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing any earlier value.
    pub fn set_duration(&self, key: &'static str, value: Duration) {
        self.fields.lock().insert(key, value);
    }

    pub fn duration(&self, key: &str) -> Option<Duration> {
        self.fields.lock().get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.fields.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<(&'static str, Duration)> {
        self.fields
            .lock()
            .iter()
            .map(|(key, value)| (*key, *value))
            .collect()
    }
}

impl std::fmt::Debug for LogFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.snapshot()).finish()
    }
}
