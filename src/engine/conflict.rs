use chrono::NaiveDate;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

/// Shape checks only: ordering and length.
pub(crate) fn validate_stay(check_in: NaiveDate, check_out: NaiveDate) -> Result<Stay, EngineError> {
    let stay = Stay::try_new(check_in, check_out).ok_or(EngineError::InvalidRange {
        check_in,
        check_out,
        reason: "check-in must be before check-out",
    })?;
    if stay.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(stay)
}

/// Shape checks plus "not in the past" relative to `today`.
pub(crate) fn validate_request(
    check_in: NaiveDate,
    check_out: NaiveDate,
    today: NaiveDate,
) -> Result<Stay, EngineError> {
    let stay = validate_stay(check_in, check_out)?;
    if stay.check_in() < today {
        return Err(EngineError::InvalidRange {
            check_in,
            check_out,
            reason: "check-in is in the past",
        });
    }
    Ok(stay)
}

pub(crate) fn validate_window(start: NaiveDate, end: NaiveDate) -> Result<Stay, EngineError> {
    let window = Stay::try_new(start, end).ok_or(EngineError::InvalidRange {
        check_in: start,
        check_out: end,
        reason: "range start must be before range end",
    })?;
    if window.nights() > MAX_QUERY_WINDOW_DAYS {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }
    Ok(window)
}

/// `Conflict` naming every confirmed booking in `overlapping`, if any.
pub(crate) fn check_no_conflict(overlapping: &[Booking]) -> Result<(), EngineError> {
    if overlapping.is_empty() {
        return Ok(());
    }
    Err(EngineError::Conflict(overlapping.iter().map(|b| b.id).collect()))
}

pub(crate) fn price(room: &Room, stay: &Stay) -> Result<u64, EngineError> {
    u64::try_from(stay.nights())
        .ok()
        .and_then(|nights| nights.checked_mul(room.nightly_rate))
        .ok_or(EngineError::LimitExceeded("price overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn rejects_inverted_and_empty_stays() {
        assert!(matches!(
            validate_stay(d(6, 3), d(6, 1)),
            Err(EngineError::InvalidRange { .. })
        ));
        assert!(matches!(
            validate_stay(d(6, 1), d(6, 1)),
            Err(EngineError::InvalidRange { .. })
        ));
    }

    #[test]
    fn rejects_overlong_stay() {
        let check_in = d(1, 1);
        let check_out = check_in + chrono::Days::new(MAX_STAY_NIGHTS as u64 + 1);
        assert_eq!(
            validate_stay(check_in, check_out),
            Err(EngineError::LimitExceeded("stay too long"))
        );
    }

    #[test]
    fn past_check_in_rejected_but_today_allowed() {
        let today = d(6, 1);
        assert!(validate_request(d(6, 1), d(6, 2), today).is_ok());
        let err = validate_request(d(5, 31), d(6, 2), today).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidRange { reason: "check-in is in the past", .. }
        ));
    }

    #[test]
    fn conflict_carries_all_ids() {
        let room_id = Ulid::new();
        let bookings: Vec<Booking> = (0..2)
            .map(|i| Booking {
                id: Ulid::new(),
                room_id,
                guest_id: Ulid::new(),
                stay: Stay::new(d(6, 1 + i), d(6, 2 + i)),
                status: BookingStatus::Confirmed,
                total_price: 0,
            })
            .collect();
        let ids: Vec<Ulid> = bookings.iter().map(|b| b.id).collect();
        assert_eq!(check_no_conflict(&bookings), Err(EngineError::Conflict(ids)));
        assert_eq!(check_no_conflict(&[]), Ok(()));
    }

    #[test]
    fn price_is_nights_times_rate() {
        let room = Room {
            id: Ulid::new(),
            name: "7".into(),
            capacity: 1,
            nightly_rate: 8_500,
        };
        assert_eq!(price(&room, &Stay::new(d(6, 1), d(6, 4))), Ok(25_500));

        let gold = Room { nightly_rate: u64::MAX, ..room };
        assert_eq!(
            price(&gold, &Stay::new(d(6, 1), d(6, 3))),
            Err(EngineError::LimitExceeded("price overflow"))
        );
    }
}
