//! Persistence seam. The engine only ever talks to a [`BookingStore`].

mod memory;
mod wal_store;

pub use memory::MemoryStore;
pub use wal_store::WalStore;

use async_trait::async_trait;
use ulid::Ulid;

use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A record with this id already exists.
    Duplicate(Ulid),
    /// A referenced record does not exist.
    NotFound(Ulid),
    Io(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Duplicate(id) => write!(f, "duplicate record: {id}"),
            StoreError::NotFound(id) => write!(f, "record not found: {id}"),
            StoreError::Io(e) => write!(f, "storage I/O error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Rooms, guests and bookings as seen by the engine.
///
/// Implementations need not serialize check-then-write sequences themselves:
/// the engine holds a per-room lock around `find_confirmed_overlaps` followed
/// by `insert_booking` or `update_status`, and keeps it until the write has
/// settled, even when the caller already saw a timeout.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn find_room(&self, id: RoomId) -> Result<Option<Room>, StoreError>;

    async fn insert_room(&self, room: Room) -> Result<(), StoreError>;

    async fn find_guest(&self, id: GuestId) -> Result<Option<Guest>, StoreError>;

    async fn insert_guest(&self, guest: Guest) -> Result<(), StoreError>;

    async fn find_booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError>;

    /// Confirmed bookings on `room_id` whose stay overlaps `stay`, ordered by check-in.
    async fn find_confirmed_overlaps(
        &self,
        room_id: RoomId,
        stay: Stay,
    ) -> Result<Vec<Booking>, StoreError>;

    async fn insert_booking(&self, booking: Booking) -> Result<BookingId, StoreError>;

    async fn update_status(&self, id: BookingId, status: BookingStatus) -> Result<(), StoreError>;

    /// Drop a booking outright. Only used to roll back an insert whose caller
    /// was already told it timed out.
    async fn remove_booking(&self, id: BookingId) -> Result<(), StoreError>;

    /// Every booking on the room in any status, ordered by check-in.
    async fn bookings_for_room(&self, room_id: RoomId) -> Result<Vec<Booking>, StoreError>;

    /// Every booking held by the guest in any status, ordered by check-in.
    async fn bookings_for_guest(&self, guest_id: GuestId) -> Result<Vec<Booking>, StoreError>;
}
