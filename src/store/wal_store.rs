use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::model::*;
use crate::wal::Wal;

use super::{BookingStore, MemoryStore, StoreError};

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        response: oneshot::Sender<io::Result<usize>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type Pending = (Event, oneshot::Sender<io::Result<()>>);

/// Background task that owns the WAL and is the only writer of the applied state.
/// 1. Block until the first Append arrives.
/// 2. Drain every Append already queued (the batch window).
/// 3. Buffer the batch, one `flush_sync` for all of it.
/// 4. On success apply the batch to memory, then answer every sender.
///
/// Applying before answering means a caller that gave up waiting still leaves
/// memory and log in agreement.
async fn wal_writer_loop(mut wal: Wal, memory: Arc<MemoryStore>, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_non_append(&mut wal, &memory, other);
                continue;
            }
        };

        let mut batch: Vec<Pending> = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }

        commit_batch(&mut wal, &memory, batch);
        if let Some(other) = deferred {
            handle_non_append(&mut wal, &memory, other);
        }
    }
    debug!("WAL writer for {} stopped", wal.path().display());
}

fn commit_batch(wal: &mut Wal, memory: &MemoryStore, batch: Vec<Pending>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();

    let mut result = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after an append error so half-buffered bytes don't leak into the next batch.
    let flushed = wal.flush_sync();
    if result.is_ok() {
        result = flushed;
    }
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());

    for (event, tx) in batch {
        let reply = match &result {
            Ok(()) => {
                memory.apply(&event);
                Ok(())
            }
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(reply);
    }
}

fn handle_non_append(wal: &mut Wal, memory: &MemoryStore, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { response } => {
            let snapshot = memory.snapshot();
            let result = wal.compact(&snapshot).map(|()| snapshot.len());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// [`MemoryStore`] made durable by a group-commit write-ahead log.
///
/// Must be opened inside a tokio runtime: the WAL writer runs as a spawned task.
pub struct WalStore {
    memory: Arc<MemoryStore>,
    wal_tx: mpsc::Sender<WalCommand>,
}

impl WalStore {
    /// Replay `path` into memory, then start the writer.
    pub fn open(path: &Path) -> io::Result<Self> {
        let events = Wal::replay(path)?;
        let memory = Arc::new(MemoryStore::new());
        for event in &events {
            memory.apply(event);
        }
        info!(
            "replayed {} events from {}: {} rooms, {} bookings",
            events.len(),
            path.display(),
            memory.room_count(),
            memory.booking_count()
        );

        let wal = Wal::open(path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, memory.clone(), wal_rx));
        Ok(Self { memory, wal_tx })
    }

    async fn write(&self, event: Event) -> Result<(), StoreError> {
        self.memory.check(&event)?;
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append { event, response: tx })
            .await
            .map_err(|_| StoreError::Io("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Io("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Io(e.to_string()))
    }

    /// Rewrite the WAL as a snapshot of the current state. Returns the record count.
    pub async fn compact(&self) -> Result<usize, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { response: tx })
            .await
            .map_err(|_| StoreError::Io("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Io("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Io(e.to_string()))
    }

    pub async fn appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

#[async_trait]
impl BookingStore for WalStore {
    async fn find_room(&self, id: RoomId) -> Result<Option<Room>, StoreError> {
        Ok(self.memory.room(&id))
    }

    async fn insert_room(&self, room: Room) -> Result<(), StoreError> {
        self.write(Event::RoomRegistered(room)).await
    }

    async fn find_guest(&self, id: GuestId) -> Result<Option<Guest>, StoreError> {
        Ok(self.memory.guest(&id))
    }

    async fn insert_guest(&self, guest: Guest) -> Result<(), StoreError> {
        self.write(Event::GuestRegistered(guest)).await
    }

    async fn find_booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        Ok(self.memory.booking(&id))
    }

    async fn find_confirmed_overlaps(
        &self,
        room_id: RoomId,
        stay: Stay,
    ) -> Result<Vec<Booking>, StoreError> {
        Ok(self.memory.confirmed_overlaps(&room_id, &stay))
    }

    async fn insert_booking(&self, booking: Booking) -> Result<BookingId, StoreError> {
        let id = booking.id;
        self.write(Event::BookingInserted(booking)).await?;
        Ok(id)
    }

    async fn update_status(&self, id: BookingId, status: BookingStatus) -> Result<(), StoreError> {
        let room_id = self
            .memory
            .booking(&id)
            .ok_or(StoreError::NotFound(id))?
            .room_id;
        self.write(Event::BookingStatusChanged { id, room_id, status }).await
    }

    async fn remove_booking(&self, id: BookingId) -> Result<(), StoreError> {
        let room_id = self
            .memory
            .booking(&id)
            .ok_or(StoreError::NotFound(id))?
            .room_id;
        self.write(Event::BookingRemoved { id, room_id }).await
    }

    async fn bookings_for_room(&self, room_id: RoomId) -> Result<Vec<Booking>, StoreError> {
        Ok(self.memory.room_bookings(&room_id))
    }

    async fn bookings_for_guest(&self, guest_id: GuestId) -> Result<Vec<Booking>, StoreError> {
        Ok(self.memory.guest_bookings(&guest_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;
    use ulid::Ulid;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("innkeep_test_wal_store");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn room() -> Room {
        Room {
            id: Ulid::new(),
            name: "Suite".into(),
            capacity: 4,
            nightly_rate: 30_000,
        }
    }

    fn confirmed(room_id: RoomId, from: u32, to: u32) -> Booking {
        Booking {
            id: Ulid::new(),
            room_id,
            guest_id: Ulid::new(),
            stay: Stay::new(d(from), d(to)),
            status: BookingStatus::Confirmed,
            total_price: 0,
        }
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let path = test_wal_path("reopen.wal");
        let r = room();
        let kept = confirmed(r.id, 1, 3);
        let dropped = confirmed(r.id, 5, 8);

        {
            let store = WalStore::open(&path).unwrap();
            store.insert_room(r.clone()).await.unwrap();
            store.insert_booking(kept.clone()).await.unwrap();
            store.insert_booking(dropped.clone()).await.unwrap();
            store
                .update_status(dropped.id, BookingStatus::Cancelled)
                .await
                .unwrap();
        }

        let store = WalStore::open(&path).unwrap();
        assert_eq!(store.find_room(r.id).await.unwrap(), Some(r.clone()));
        let overlaps = store
            .find_confirmed_overlaps(r.id, Stay::new(d(1), d(10)))
            .await
            .unwrap();
        assert_eq!(overlaps, vec![kept]);
        let cancelled = store.find_booking(dropped.id).await.unwrap().unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn rejected_writes_never_reach_the_log() {
        let path = test_wal_path("rejected.wal");
        let store = WalStore::open(&path).unwrap();
        let r = room();
        store.insert_room(r.clone()).await.unwrap();

        assert_eq!(
            store.insert_room(r.clone()).await,
            Err(StoreError::Duplicate(r.id))
        );
        assert_eq!(store.appends_since_compact().await, 1);
        assert_eq!(Wal::replay(&path).unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_all_land() {
        let path = test_wal_path("concurrent.wal");
        let store = Arc::new(WalStore::open(&path).unwrap());

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.insert_room(room()).await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(store.appends_since_compact().await, 32);
        assert_eq!(Wal::replay(&path).unwrap().len(), 32);
    }

    #[tokio::test]
    async fn compact_keeps_state_and_shrinks_log() {
        let path = test_wal_path("compact.wal");
        let r = room();
        let b = confirmed(r.id, 1, 3);
        {
            let store = WalStore::open(&path).unwrap();
            store.insert_room(r.clone()).await.unwrap();
            store.insert_booking(b.clone()).await.unwrap();
            for _ in 0..10 {
                store.update_status(b.id, BookingStatus::Confirmed).await.unwrap();
            }
            store.update_status(b.id, BookingStatus::Cancelled).await.unwrap();
            let before = std::fs::metadata(&path).unwrap().len();

            assert_eq!(store.compact().await.unwrap(), 2);
            assert_eq!(store.appends_since_compact().await, 0);
            let after = std::fs::metadata(&path).unwrap().len();
            assert!(after < before, "compacted WAL should be smaller: {after} < {before}");
        }

        let store = WalStore::open(&path).unwrap();
        let restored = store.find_booking(b.id).await.unwrap().unwrap();
        assert_eq!(restored.status, BookingStatus::Cancelled);
        assert_eq!(store.bookings_for_room(r.id).await.unwrap().len(), 1);
    }
}
