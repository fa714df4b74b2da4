#![allow(dead_code)]
use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tx_middleware::transaction::TransactionalConnection;

pub mod postgres;

/// Database time charged by `begin`, so tests can tell a differenced counter
/// from a raw one.
pub const BEGIN_OVERHEAD: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxEvent {
    Begin(usize),
    Commit { id: usize, marker: Option<String> },
    Rollback { id: usize, marker: Option<String> },
}

#[derive(Debug)]
pub struct FakeTx {
    id: usize,
    elapsed: Duration,
    marker: Option<String>,
}

impl FakeTx {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn simulate_query(&mut self, took: Duration) {
        self.elapsed += took;
    }

    pub fn mark(&mut self, marker: impl Into<String>) {
        self.marker = Some(marker.into());
    }
}

#[derive(Default)]
struct Recorder {
    next_id: AtomicUsize,
    events: Mutex<Vec<TxEvent>>,
    fail_begin: AtomicBool,
    fail_commit: AtomicBool,
    fail_rollback: AtomicBool,
}

/// Connection double that records every transaction operation.
#[derive(Clone, Default)]
pub struct RecordingConnection {
    recorder: Arc<Recorder>,
}

impl RecordingConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_begin(self) -> Self {
        self.recorder.fail_begin.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_commit(self) -> Self {
        self.recorder.fail_commit.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_rollback(self) -> Self {
        self.recorder.fail_rollback.store(true, Ordering::SeqCst);
        self
    }

    pub fn events(&self) -> Vec<TxEvent> {
        self.recorder.events.lock().clone()
    }

    pub fn commits(&self) -> Vec<(usize, Option<String>)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                TxEvent::Commit { id, marker } => Some((id, marker)),
                _ => None,
            })
            .collect()
    }

    pub fn rollbacks(&self) -> Vec<(usize, Option<String>)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                TxEvent::Rollback { id, marker } => Some((id, marker)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: TxEvent) {
        self.recorder.events.lock().push(event);
    }
}

#[async_trait]
impl TransactionalConnection for RecordingConnection {
    type Transaction = FakeTx;

    async fn begin(&self) -> Result<FakeTx, sqlx::Error> {
        if self.recorder.fail_begin.load(Ordering::SeqCst) {
            return Err(sqlx::Error::Protocol("begin refused".to_string()));
        }
        let id = self.recorder.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.record(TxEvent::Begin(id));
        Ok(FakeTx {
            id,
            elapsed: BEGIN_OVERHEAD,
            marker: None,
        })
    }

    async fn commit(&self, tx: FakeTx) -> Result<(), sqlx::Error> {
        self.record(TxEvent::Commit {
            id: tx.id,
            marker: tx.marker,
        });
        if self.recorder.fail_commit.load(Ordering::SeqCst) {
            return Err(sqlx::Error::Protocol("commit refused".to_string()));
        }
        Ok(())
    }

    async fn rollback(&self, tx: FakeTx) -> Result<(), sqlx::Error> {
        self.record(TxEvent::Rollback {
            id: tx.id,
            marker: tx.marker,
        });
        if self.recorder.fail_rollback.load(Ordering::SeqCst) {
            return Err(sqlx::Error::Protocol("rollback refused".to_string()));
        }
        Ok(())
    }

    fn elapsed(&self, tx: &FakeTx) -> Duration {
        tx.elapsed
    }
}
