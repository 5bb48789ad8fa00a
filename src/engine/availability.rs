use std::iter::FusedIterator;

use chrono::NaiveDate;

use crate::model::*;

// ── Availability sweep ───────────────────────────────────────────

/// Confirmed stays over a query window, sorted by check-in.
///
/// Holds no store handle: [`Availability::gaps`] can be called any number of
/// times and each call sweeps from the start of the window again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    pub room_id: RoomId,
    pub window: Stay,
    booked: Vec<Stay>,
}

impl Availability {
    pub fn new(room_id: RoomId, window: Stay, mut booked: Vec<Stay>) -> Self {
        booked.sort_by_key(|s| s.check_in());
        Self { room_id, window, booked }
    }

    /// Lazy sweep over the free sub-ranges of the window.
    pub fn gaps(&self) -> Gaps<'_> {
        Gaps {
            booked: &self.booked,
            next: 0,
            cursor: self.window.check_in(),
            end: self.window.check_out(),
        }
    }

    pub fn is_free(&self) -> bool {
        self.gaps().next() == Some(self.window)
    }

    pub fn is_fully_booked(&self) -> bool {
        self.gaps().next().is_none()
    }

    pub fn free_nights(&self) -> i64 {
        self.gaps().map(|g| g.nights()).sum()
    }
}

impl<'a> IntoIterator for &'a Availability {
    type Item = Stay;
    type IntoIter = Gaps<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.gaps()
    }
}

/// Iterator over the gaps of an [`Availability`]. Single pass over the
/// sorted stays; overlapping or adjacent stays merge naturally because the
/// cursor only moves forward.
#[derive(Debug, Clone)]
pub struct Gaps<'a> {
    booked: &'a [Stay],
    next: usize,
    cursor: NaiveDate,
    end: NaiveDate,
}

impl Iterator for Gaps<'_> {
    type Item = Stay;

    fn next(&mut self) -> Option<Stay> {
        while self.cursor < self.end {
            let Some(stay) = self.booked.get(self.next) else {
                let gap = Stay::new(self.cursor, self.end);
                self.cursor = self.end;
                return Some(gap);
            };
            self.next += 1;

            let gap_end = stay.check_in().min(self.end);
            let gap_start = self.cursor;
            self.cursor = self.cursor.max(stay.check_out());
            if gap_start < gap_end {
                return Some(Stay::new(gap_start, gap_end));
            }
        }
        None
    }
}

impl FusedIterator for Gaps<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn s(from: u32, to: u32) -> Stay {
        Stay::new(d(from), d(to))
    }

    fn gaps(window: Stay, booked: Vec<Stay>) -> Vec<Stay> {
        Availability::new(Ulid::new(), window, booked).gaps().collect()
    }

    #[test]
    fn empty_room_is_one_gap() {
        assert_eq!(gaps(s(1, 10), vec![]), vec![s(1, 10)]);
    }

    #[test]
    fn booking_punches_middle() {
        assert_eq!(gaps(s(1, 10), vec![s(3, 5)]), vec![s(1, 3), s(5, 10)]);
    }

    #[test]
    fn bookings_straddling_window_edges_are_clamped() {
        assert_eq!(gaps(s(5, 15), vec![s(1, 7), s(12, 20)]), vec![s(7, 12)]);
    }

    #[test]
    fn adjacent_bookings_leave_no_sliver() {
        assert_eq!(gaps(s(1, 10), vec![s(2, 4), s(4, 6)]), vec![s(1, 2), s(6, 10)]);
    }

    #[test]
    fn nested_and_unsorted_bookings() {
        assert_eq!(
            gaps(s(1, 20), vec![s(10, 12), s(2, 9), s(3, 4)]),
            vec![s(1, 2), s(9, 10), s(12, 20)]
        );
    }

    #[test]
    fn fully_booked_window_has_no_gaps() {
        let avail = Availability::new(Ulid::new(), s(3, 6), vec![s(1, 4), s(4, 9)]);
        assert!(avail.is_fully_booked());
        assert!(!avail.is_free());
        assert_eq!(avail.free_nights(), 0);
    }

    #[test]
    fn gaps_restart_and_fuse() {
        let avail = Availability::new(Ulid::new(), s(1, 10), vec![s(4, 6)]);
        let first: Vec<Stay> = avail.gaps().collect();
        let second: Vec<Stay> = (&avail).into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(avail.free_nights(), 7);

        let mut it = avail.gaps();
        assert_eq!(it.by_ref().count(), 2);
        assert_eq!(it.next(), None);
        assert_eq!(it.next(), None);
    }

    #[test]
    fn gaps_are_lazy() {
        let booked: Vec<Stay> = (0..10).map(|i| s(2 * i + 1, 2 * i + 2)).collect();
        let avail = Availability::new(Ulid::new(), s(1, 30), booked);
        let first_two: Vec<Stay> = avail.gaps().take(2).collect();
        assert_eq!(first_two, vec![s(2, 3), s(4, 5)]);
    }
}
