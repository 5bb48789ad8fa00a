use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

pub type RoomId = Ulid;
pub type GuestId = Ulid;
pub type BookingId = Ulid;

/// Half-open night range `[check_in, check_out)`. The check-out day is free
/// for the next guest. Always holds at least one night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawStay")]
pub struct Stay {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

#[derive(Deserialize)]
struct RawStay {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl TryFrom<RawStay> for Stay {
    type Error = &'static str;

    fn try_from(raw: RawStay) -> Result<Self, Self::Error> {
        Stay::try_new(raw.check_in, raw.check_out).ok_or("stay check_in must be before check_out")
    }
}

impl Stay {
    /// # Panics
    ///
    /// Panics unless `check_in < check_out`. Use [`Stay::try_new`] for
    /// unchecked input.
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        assert!(check_in < check_out, "stay check_in must be before check_out");
        Self { check_in, check_out }
    }

    /// `None` unless `check_in < check_out`.
    pub fn try_new(check_in: NaiveDate, check_out: NaiveDate) -> Option<Self> {
        (check_in < check_out).then_some(Self { check_in, check_out })
    }

    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    pub fn overlaps(&self, other: &Stay) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }
}

impl std::fmt::Display for Stay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.check_in, self.check_out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    /// Room number or label shown to staff.
    pub name: String,
    /// Max guests.
    pub capacity: u32,
    /// Price per night in minor currency units.
    pub nightly_rate: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub id: GuestId,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub room_id: RoomId,
    pub guest_id: GuestId,
    pub stay: Stay,
    pub status: BookingStatus,
    /// `stay.nights() * room.nightly_rate` at the time of the request.
    pub total_price: u64,
}

impl Booking {
    pub fn is_confirmed(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }
}

/// WAL record format. Flat, no nesting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomRegistered(Room),
    GuestRegistered(Guest),
    BookingInserted(Booking),
    BookingStatusChanged {
        id: BookingId,
        room_id: RoomId,
        status: BookingStatus,
    },
    /// Undoes a `BookingInserted` whose caller was told the write timed out.
    BookingRemoved { id: BookingId, room_id: RoomId },
}
