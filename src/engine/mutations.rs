use chrono::NaiveDate;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::conflict::{check_no_conflict, price, validate_request};
use super::{Engine, EngineError, Rollback, Section};

fn check_name(name: &str) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::LimitExceeded("name must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(())
}

// ── Critical sections (run with the room lock held) ──────────────

async fn insert_if_free(section: Section, booking: Booking) -> Result<Booking, EngineError> {
    let (room_id, stay) = (booking.room_id, booking.stay);
    let store = section.store.as_ref();
    let overlapping = section
        .policy
        .read("find_confirmed_overlaps", move || store.find_confirmed_overlaps(room_id, stay))
        .await?;
    check_no_conflict(&overlapping)?;

    let store = section.store.clone();
    let inserted = booking.clone();
    section
        .write(
            async move { store.insert_booking(inserted).await },
            Rollback::Remove(booking.id),
        )
        .await?;
    Ok(booking)
}

async fn confirm_if_free(section: Section, booking_id: BookingId) -> Result<Booking, EngineError> {
    let store = section.store.as_ref();
    // Re-read under the lock: the status may have moved since the caller looked.
    let mut booking = section
        .policy
        .read("find_booking", move || store.find_booking(booking_id))
        .await?
        .ok_or(EngineError::NotFound(booking_id))?;
    match booking.status {
        BookingStatus::Confirmed => return Ok(booking),
        BookingStatus::Cancelled => {
            return Err(EngineError::InvalidState {
                id: booking_id,
                status: booking.status,
            });
        }
        BookingStatus::Pending => {}
    }

    let (room_id, stay) = (booking.room_id, booking.stay);
    let overlapping = section
        .policy
        .read("find_confirmed_overlaps", move || store.find_confirmed_overlaps(room_id, stay))
        .await?;
    check_no_conflict(&overlapping)?;

    let store = section.store.clone();
    section
        .write(
            async move { store.update_status(booking_id, BookingStatus::Confirmed).await },
            Rollback::Restore(booking_id, BookingStatus::Pending),
        )
        .await?;
    booking.status = BookingStatus::Confirmed;
    info!("booking {booking_id} confirmed from pending: room {room_id} {stay}");
    Ok(booking)
}

async fn cancel_unless_cancelled(
    section: Section,
    booking_id: BookingId,
    actor_id: Ulid,
) -> Result<Booking, EngineError> {
    let store = section.store.as_ref();
    let mut booking = section
        .policy
        .read("find_booking", move || store.find_booking(booking_id))
        .await?
        .ok_or(EngineError::NotFound(booking_id))?;
    if booking.status == BookingStatus::Cancelled {
        debug!("booking {booking_id} already cancelled, actor {actor_id}");
        return Ok(booking);
    }

    let previous = booking.status;
    let store = section.store.clone();
    section
        .write(
            async move { store.update_status(booking_id, BookingStatus::Cancelled).await },
            Rollback::Restore(booking_id, previous),
        )
        .await?;
    booking.status = BookingStatus::Cancelled;
    metrics::counter!(observability::BOOKINGS_CANCELLED_TOTAL).increment(1);
    info!(
        "booking {booking_id} cancelled by {actor_id}: room {} {}",
        booking.room_id, booking.stay
    );
    Ok(booking)
}

impl Engine {
    pub async fn register_room(
        &self,
        name: String,
        capacity: u32,
        nightly_rate: u64,
    ) -> Result<Room, EngineError> {
        check_name(&name)?;
        if capacity == 0 {
            return Err(EngineError::LimitExceeded("room capacity must be at least 1"));
        }

        let room = Room {
            id: Ulid::new(),
            name,
            capacity,
            nightly_rate,
        };
        self.policy
            .bounded(self.store.insert_room(room.clone()))
            .await?;
        info!("registered room {} ({})", room.id, room.name);
        Ok(room)
    }

    pub async fn register_guest(&self, name: String, email: String) -> Result<Guest, EngineError> {
        check_name(&name)?;
        if email.len() > MAX_EMAIL_LEN {
            return Err(EngineError::LimitExceeded("email too long"));
        }
        if !email.contains('@') {
            return Err(EngineError::LimitExceeded("email must contain '@'"));
        }

        let guest = Guest {
            id: Ulid::new(),
            name,
            email,
        };
        self.policy
            .bounded(self.store.insert_guest(guest.clone()))
            .await?;
        info!("registered guest {}", guest.id);
        Ok(guest)
    }

    /// Validate, resolve the room and build the booking record. No writes.
    async fn draft_booking(
        &self,
        room_id: RoomId,
        check_in: NaiveDate,
        check_out: NaiveDate,
        guest_id: GuestId,
        today: NaiveDate,
        status: BookingStatus,
    ) -> Result<Booking, EngineError> {
        let stay = validate_request(check_in, check_out, today)?;
        let store = self.store.as_ref();
        let room = self
            .policy
            .read("find_room", move || store.find_room(room_id))
            .await?
            .ok_or(EngineError::NotFound(room_id))?;

        Ok(Booking {
            id: Ulid::new(),
            room_id,
            guest_id,
            stay,
            status,
            total_price: price(&room, &stay)?,
        })
    }

    /// Book `[check_in, check_out)` in `room_id` for `guest_id`.
    ///
    /// Fails with `Conflict` naming every confirmed booking the stay overlaps.
    /// The overlap check and the insert run inside the room's critical section.
    pub async fn request_booking(
        &self,
        room_id: RoomId,
        check_in: NaiveDate,
        check_out: NaiveDate,
        guest_id: GuestId,
        today: NaiveDate,
    ) -> Result<Booking, EngineError> {
        let booking = self
            .draft_booking(room_id, check_in, check_out, guest_id, today, BookingStatus::Confirmed)
            .await?;

        let result = self
            .exclusive(room_id, move |section| insert_if_free(section, booking))
            .await;

        let outcome = match &result {
            Ok(b) => {
                info!("booking {} confirmed: room {room_id} {}", b.id, b.stay);
                "confirmed"
            }
            Err(EngineError::Conflict(ids)) => {
                debug!("booking request for room {room_id} rejected, {} conflicts", ids.len());
                "conflict"
            }
            Err(_) => "error",
        };
        metrics::counter!(observability::BOOKINGS_REQUESTED_TOTAL, "outcome" => outcome).increment(1);
        result
    }

    /// Record a booking without claiming the nights. It blocks nobody until
    /// [`Engine::confirm_booking`] succeeds.
    pub async fn place_pending(
        &self,
        room_id: RoomId,
        check_in: NaiveDate,
        check_out: NaiveDate,
        guest_id: GuestId,
        today: NaiveDate,
    ) -> Result<Booking, EngineError> {
        let booking = self
            .draft_booking(room_id, check_in, check_out, guest_id, today, BookingStatus::Pending)
            .await?;
        self.policy
            .bounded(self.store.insert_booking(booking.clone()))
            .await?;
        info!("booking {} pending: room {room_id} {}", booking.id, booking.stay);
        Ok(booking)
    }

    async fn room_of(&self, booking_id: BookingId) -> Result<RoomId, EngineError> {
        let store = self.store.as_ref();
        self.policy
            .read("find_booking", move || store.find_booking(booking_id))
            .await?
            .map(|b| b.room_id)
            .ok_or(EngineError::NotFound(booking_id))
    }

    /// Pending → Confirmed after the overlap check. Confirming a confirmed
    /// booking is a no-op; a cancelled one is `InvalidState`.
    pub async fn confirm_booking(&self, booking_id: BookingId) -> Result<Booking, EngineError> {
        let room_id = self.room_of(booking_id).await?;
        self.exclusive(room_id, move |section| confirm_if_free(section, booking_id))
            .await
    }

    /// Cancel a pending or confirmed booking, freeing its nights. Cancelling
    /// an already-cancelled booking succeeds and changes nothing.
    ///
    /// `actor_id` comes from the caller's authentication layer and is only logged.
    pub async fn cancel_booking(
        &self,
        booking_id: BookingId,
        actor_id: Ulid,
    ) -> Result<Booking, EngineError> {
        let room_id = self.room_of(booking_id).await?;
        self.exclusive(room_id, move |section| {
            cancel_unless_cancelled(section, booking_id, actor_id)
        })
        .await
    }
}
