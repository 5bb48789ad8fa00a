mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;

pub use availability::{Availability, Gaps};
pub use error::EngineError;

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};

use crate::compactor;
use crate::config::Config;
use crate::model::{BookingId, BookingStatus, RoomId};
use crate::observability;
use crate::store::{BookingStore, StoreError, WalStore};

/// Timeout and retry rules for every call into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoragePolicy {
    pub timeout: Duration,
    pub retry_backoff: Duration,
}

impl StoragePolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.storage_timeout,
            retry_backoff: config.retry_backoff,
        }
    }

    /// One store call, cut off at `timeout`.
    pub(super) async fn bounded<T>(
        self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, EngineError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(EngineError::from),
            Err(_) => {
                metrics::counter!(observability::STORAGE_TIMEOUTS_TOTAL).increment(1);
                Err(EngineError::StorageTimeout)
            }
        }
    }

    /// A read: on timeout, wait `retry_backoff` and try exactly once more.
    /// Writes are never retried, since a timed-out write may still commit.
    pub(super) async fn read<T, F, Fut>(self, op: &'static str, mut call: F) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        match self.bounded(call()).await {
            Err(EngineError::StorageTimeout) => {
                warn!("{op}: storage timed out, retrying in {:?}", self.retry_backoff);
                metrics::counter!(observability::STORAGE_RETRIES_TOTAL).increment(1);
                tokio::time::sleep(self.retry_backoff).await;
                self.bounded(call()).await
            }
            other => other,
        }
    }
}

/// How to undo a critical-section write that landed after its caller was
/// told `StorageTimeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Rollback {
    /// Drop a freshly inserted booking.
    Remove(BookingId),
    /// Put a booking back into the status it had.
    Restore(BookingId, BookingStatus),
}

impl Rollback {
    async fn run(self, store: &dyn BookingStore) -> Result<(), StoreError> {
        match self {
            Rollback::Remove(id) => store.remove_booking(id).await,
            Rollback::Restore(id, status) => store.update_status(id, status).await,
        }
    }
}

/// A room's critical section: the store, plus the room lock it holds.
pub(super) struct Section {
    pub(super) store: Arc<dyn BookingStore>,
    pub(super) policy: StoragePolicy,
    room_id: RoomId,
    guard: OwnedMutexGuard<()>,
}

impl Section {
    /// The section's closing write.
    ///
    /// The caller gets `StorageTimeout` once `policy.timeout` passes, but the
    /// room stays locked until `call` settles. If it lands anyway, `rollback`
    /// runs before the lock is released, so no later critical section on the
    /// room sees a write its caller was told failed.
    pub(super) async fn write<T>(
        self,
        call: impl Future<Output = Result<T, StoreError>> + Send + 'static,
        rollback: Rollback,
    ) -> Result<T, EngineError>
    where
        T: Send + 'static,
    {
        let mut call = Box::pin(call);
        match tokio::time::timeout(self.policy.timeout, &mut call).await {
            Ok(result) => result.map_err(EngineError::from),
            Err(_) => {
                metrics::counter!(observability::STORAGE_TIMEOUTS_TOTAL).increment(1);
                let Section {
                    store,
                    room_id,
                    guard,
                    ..
                } = self;
                warn!("room {room_id}: write timed out, holding the room until it settles");
                tokio::spawn(async move {
                    if call.await.is_ok() {
                        match rollback.run(store.as_ref()).await {
                            Ok(()) => info!("room {room_id}: late write rolled back ({rollback:?})"),
                            Err(e) => error!("room {room_id}: rollback {rollback:?} failed: {e}"),
                        }
                    }
                    drop(guard);
                });
                Err(EngineError::StorageTimeout)
            }
        }
    }
}

/// Booking availability engine. Cheap to share behind an `Arc`; holds no
/// process-wide state.
pub struct Engine {
    store: Arc<dyn BookingStore>,
    policy: StoragePolicy,
    /// One lock per room. Serializes overlap check + write.
    room_locks: DashMap<RoomId, Arc<Mutex<()>>>,
}

impl Engine {
    pub fn new(store: Arc<dyn BookingStore>, config: &Config) -> Self {
        Self {
            store,
            policy: StoragePolicy::from_config(config),
            room_locks: DashMap::new(),
        }
    }

    /// Durable engine under `config.data_dir`: replays the WAL and starts the
    /// background compactor. Must be called inside a tokio runtime.
    pub fn open(config: &Config) -> io::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let store = Arc::new(WalStore::open(&config.wal_path())?);
        compactor::spawn_compactor(&store, config);
        Ok(Self::new(store, config))
    }

    fn room_lock(&self, room_id: RoomId) -> Arc<Mutex<()>> {
        self.room_locks.entry(room_id).or_default().value().clone()
    }

    /// Run `body` as the critical section for `room_id`.
    ///
    /// Waiting for the lock is cancellable and has no side effect. Once the
    /// lock is held, `body` runs on its own task that owns the [`Section`],
    /// so a caller dropping this future cannot stop it halfway.
    pub(super) async fn exclusive<T, F, Fut>(&self, room_id: RoomId, body: F) -> Result<T, EngineError>
    where
        F: FnOnce(Section) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, EngineError>> + Send + 'static,
        T: Send + 'static,
    {
        let section = Section {
            store: self.store.clone(),
            policy: self.policy,
            room_id,
            guard: self.room_lock(room_id).lock_owned().await,
        };
        let task = tokio::spawn(async move {
            let started = Instant::now();
            let result = body(section).await;
            metrics::histogram!(observability::CRITICAL_SECTION_SECONDS)
                .record(started.elapsed().as_secs_f64());
            result
        });
        task.await
            .map_err(|e| EngineError::Storage(format!("critical section for room {room_id} failed: {e}")))?
    }
}
