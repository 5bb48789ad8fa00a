//! Booking consistency core for a hotel: rooms, guests and bookings, with a
//! guarantee that no two confirmed bookings hold a room over overlapping nights.

pub mod compactor;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod store;
pub mod wal;

pub use config::Config;
pub use engine::{Availability, Engine, EngineError, Gaps, StoragePolicy};
pub use model::{Booking, BookingId, BookingStatus, Guest, GuestId, Room, RoomId, Stay};
pub use store::{BookingStore, MemoryStore, StoreError, WalStore};
