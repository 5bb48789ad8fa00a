use chrono::NaiveDate;
use tracing::debug;

use crate::model::*;

use super::availability::Availability;
use super::conflict::{price, validate_stay, validate_window};
use super::{Engine, EngineError};

impl Engine {
    pub async fn get_room(&self, room_id: RoomId) -> Result<Room, EngineError> {
        let store = self.store.as_ref();
        self.policy
            .read("find_room", move || store.find_room(room_id))
            .await?
            .ok_or(EngineError::NotFound(room_id))
    }

    pub async fn get_guest(&self, guest_id: GuestId) -> Result<Guest, EngineError> {
        let store = self.store.as_ref();
        self.policy
            .read("find_guest", move || store.find_guest(guest_id))
            .await?
            .ok_or(EngineError::NotFound(guest_id))
    }

    pub async fn get_booking(&self, booking_id: BookingId) -> Result<Booking, EngineError> {
        let store = self.store.as_ref();
        self.policy
            .read("find_booking", move || store.find_booking(booking_id))
            .await?
            .ok_or(EngineError::NotFound(booking_id))
    }

    pub async fn bookings_for_room(&self, room_id: RoomId) -> Result<Vec<Booking>, EngineError> {
        self.get_room(room_id).await?;
        let store = self.store.as_ref();
        self.policy
            .read("bookings_for_room", move || store.bookings_for_room(room_id))
            .await
    }

    pub async fn bookings_for_guest(&self, guest_id: GuestId) -> Result<Vec<Booking>, EngineError> {
        let store = self.store.as_ref();
        self.policy
            .read("bookings_for_guest", move || store.bookings_for_guest(guest_id))
            .await
    }

    /// Price of `[check_in, check_out)` in `room_id`. Books nothing.
    pub async fn quote(
        &self,
        room_id: RoomId,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<u64, EngineError> {
        let stay = validate_stay(check_in, check_out)?;
        let room = self.get_room(room_id).await?;
        price(&room, &stay)
    }

    /// Free sub-ranges of `[range_start, range_end)` for `room_id`.
    ///
    /// Reads the confirmed bookings once; the returned snapshot's
    /// [`Availability::gaps`] sweeps them lazily and can be restarted.
    pub async fn list_availability(
        &self,
        room_id: RoomId,
        range_start: NaiveDate,
        range_end: NaiveDate,
    ) -> Result<Availability, EngineError> {
        let window = validate_window(range_start, range_end)?;
        self.get_room(room_id).await?;

        let store = self.store.as_ref();
        let booked: Vec<Stay> = self
            .policy
            .read("find_confirmed_overlaps", move || {
                store.find_confirmed_overlaps(room_id, window)
            })
            .await?
            .into_iter()
            .map(|b| b.stay)
            .collect();
        debug!("availability for room {room_id} {window}: {} confirmed stays", booked.len());
        Ok(Availability::new(room_id, window, booked))
    }
}
