use async_trait::async_trait;
use dashmap::DashMap;

use crate::model::*;

use super::{BookingStore, StoreError};

/// A confirmed stay in a room's index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Held {
    id: BookingId,
    stay: Stay,
}

/// Holds everything in `DashMap`s. Also the applied state behind [`super::WalStore`].
pub struct MemoryStore {
    rooms: DashMap<RoomId, Room>,
    guests: DashMap<GuestId, Guest>,
    bookings: DashMap<BookingId, Booking>,
    /// Confirmed stays per room, sorted by `check_in`.
    confirmed: DashMap<RoomId, Vec<Held>>,
    by_room: DashMap<RoomId, Vec<BookingId>>,
    by_guest: DashMap<GuestId, Vec<BookingId>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            guests: DashMap::new(),
            bookings: DashMap::new(),
            confirmed: DashMap::new(),
            by_room: DashMap::new(),
            by_guest: DashMap::new(),
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    pub fn room(&self, id: &RoomId) -> Option<Room> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn guest(&self, id: &GuestId) -> Option<Guest> {
        self.guests.get(id).map(|e| e.value().clone())
    }

    pub fn booking(&self, id: &BookingId) -> Option<Booking> {
        self.bookings.get(id).map(|e| e.value().clone())
    }

    /// Confirmed bookings overlapping `stay`. Binary search skips everything
    /// checking in on or after `stay.check_out()`.
    pub fn confirmed_overlaps(&self, room_id: &RoomId, stay: &Stay) -> Vec<Booking> {
        let ids: Vec<BookingId> = match self.confirmed.get(room_id) {
            Some(held) => {
                let right_bound = held.partition_point(|h| h.stay.check_in() < stay.check_out());
                held[..right_bound]
                    .iter()
                    .filter(|h| h.stay.check_out() > stay.check_in())
                    .map(|h| h.id)
                    .collect()
            }
            None => return Vec::new(),
        };
        ids.iter().filter_map(|id| self.booking(id)).collect()
    }

    fn collect_sorted(&self, ids: Option<Vec<BookingId>>) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = ids
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.booking(id))
            .collect();
        bookings.sort_by_key(|b| (b.stay.check_in(), b.id));
        bookings
    }

    pub fn room_bookings(&self, room_id: &RoomId) -> Vec<Booking> {
        self.collect_sorted(self.by_room.get(room_id).map(|e| e.value().clone()))
    }

    pub fn guest_bookings(&self, guest_id: &GuestId) -> Vec<Booking> {
        self.collect_sorted(self.by_guest.get(guest_id).map(|e| e.value().clone()))
    }

    // ── Event application ────────────────────────────────────

    /// Reject an event that would break referential integrity. Does not mutate.
    pub fn check(&self, event: &Event) -> Result<(), StoreError> {
        match event {
            Event::RoomRegistered(room) if self.rooms.contains_key(&room.id) => {
                Err(StoreError::Duplicate(room.id))
            }
            Event::GuestRegistered(guest) if self.guests.contains_key(&guest.id) => {
                Err(StoreError::Duplicate(guest.id))
            }
            Event::BookingInserted(booking) => {
                if self.bookings.contains_key(&booking.id) {
                    return Err(StoreError::Duplicate(booking.id));
                }
                if !self.rooms.contains_key(&booking.room_id) {
                    return Err(StoreError::NotFound(booking.room_id));
                }
                Ok(())
            }
            Event::BookingStatusChanged { id, .. } | Event::BookingRemoved { id, .. }
                if !self.bookings.contains_key(id) =>
            {
                Err(StoreError::NotFound(*id))
            }
            _ => Ok(()),
        }
    }

    /// Apply an already-checked (or replayed) event.
    pub fn apply(&self, event: &Event) {
        match event {
            Event::RoomRegistered(room) => {
                self.rooms.insert(room.id, room.clone());
            }
            Event::GuestRegistered(guest) => {
                self.guests.insert(guest.id, guest.clone());
            }
            Event::BookingInserted(booking) => {
                if booking.is_confirmed() {
                    self.hold(booking.room_id, booking.id, booking.stay);
                }
                self.by_room.entry(booking.room_id).or_default().push(booking.id);
                self.by_guest.entry(booking.guest_id).or_default().push(booking.id);
                self.bookings.insert(booking.id, booking.clone());
            }
            Event::BookingStatusChanged { id, room_id, status } => {
                let (previous, stay) = match self.bookings.get_mut(id) {
                    Some(mut entry) => {
                        let previous = entry.status;
                        entry.status = *status;
                        (previous, entry.stay)
                    }
                    None => return,
                };
                match (previous, *status) {
                    (BookingStatus::Confirmed, BookingStatus::Confirmed) => {}
                    (_, BookingStatus::Confirmed) => self.hold(*room_id, *id, stay),
                    (BookingStatus::Confirmed, _) => self.release(room_id, id),
                    _ => {}
                }
            }
            Event::BookingRemoved { id, room_id } => {
                let Some((_, booking)) = self.bookings.remove(id) else {
                    return;
                };
                self.release(room_id, id);
                if let Some(mut ids) = self.by_room.get_mut(room_id) {
                    ids.retain(|b| b != id);
                }
                if let Some(mut ids) = self.by_guest.get_mut(&booking.guest_id) {
                    ids.retain(|b| b != id);
                }
            }
        }
    }

    fn hold(&self, room_id: RoomId, id: BookingId, stay: Stay) {
        let mut held = self.confirmed.entry(room_id).or_default();
        let pos = held
            .binary_search_by_key(&stay.check_in(), |h| h.stay.check_in())
            .unwrap_or_else(|e| e);
        held.insert(pos, Held { id, stay });
    }

    fn release(&self, room_id: &RoomId, id: &BookingId) {
        if let Some(mut held) = self.confirmed.get_mut(room_id) {
            held.retain(|h| h.id != *id);
        }
    }

    /// Minimal event list that recreates the current state: rooms, then
    /// guests, then bookings with their current status.
    pub fn snapshot(&self) -> Vec<Event> {
        let mut rooms: Vec<Room> = self.rooms.iter().map(|e| e.value().clone()).collect();
        rooms.sort_by_key(|r| r.id);
        let mut guests: Vec<Guest> = self.guests.iter().map(|e| e.value().clone()).collect();
        guests.sort_by_key(|g| g.id);
        let mut bookings: Vec<Booking> = self.bookings.iter().map(|e| e.value().clone()).collect();
        bookings.sort_by_key(|b| b.id);

        rooms
            .into_iter()
            .map(Event::RoomRegistered)
            .chain(guests.into_iter().map(Event::GuestRegistered))
            .chain(bookings.into_iter().map(Event::BookingInserted))
            .collect()
    }

    fn commit(&self, event: &Event) -> Result<(), StoreError> {
        self.check(event)?;
        self.apply(event);
        Ok(())
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn find_room(&self, id: RoomId) -> Result<Option<Room>, StoreError> {
        Ok(self.room(&id))
    }

    async fn insert_room(&self, room: Room) -> Result<(), StoreError> {
        self.commit(&Event::RoomRegistered(room))
    }

    async fn find_guest(&self, id: GuestId) -> Result<Option<Guest>, StoreError> {
        Ok(self.guest(&id))
    }

    async fn insert_guest(&self, guest: Guest) -> Result<(), StoreError> {
        self.commit(&Event::GuestRegistered(guest))
    }

    async fn find_booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        Ok(self.booking(&id))
    }

    async fn find_confirmed_overlaps(
        &self,
        room_id: RoomId,
        stay: Stay,
    ) -> Result<Vec<Booking>, StoreError> {
        Ok(self.confirmed_overlaps(&room_id, &stay))
    }

    async fn insert_booking(&self, booking: Booking) -> Result<BookingId, StoreError> {
        let id = booking.id;
        self.commit(&Event::BookingInserted(booking))?;
        Ok(id)
    }

    async fn update_status(&self, id: BookingId, status: BookingStatus) -> Result<(), StoreError> {
        let room_id = self.booking(&id).ok_or(StoreError::NotFound(id))?.room_id;
        self.commit(&Event::BookingStatusChanged { id, room_id, status })
    }

    async fn remove_booking(&self, id: BookingId) -> Result<(), StoreError> {
        let room_id = self.booking(&id).ok_or(StoreError::NotFound(id))?.room_id;
        self.commit(&Event::BookingRemoved { id, room_id })
    }

    async fn bookings_for_room(&self, room_id: RoomId) -> Result<Vec<Booking>, StoreError> {
        Ok(self.room_bookings(&room_id))
    }

    async fn bookings_for_guest(&self, guest_id: GuestId) -> Result<Vec<Booking>, StoreError> {
        Ok(self.guest_bookings(&guest_id))
    }
}
