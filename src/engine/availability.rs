use std::collections::BTreeSet;

use ulid::Ulid;

use crate::model::*;

// ── Availability Index ────────────────────────────────────────────

/// Read model of the stays already booked on one listing.
///
/// Built fresh for every booking attempt from whatever the store returns;
/// entries are sorted by check-in so queries can binary search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityIndex {
    listing_id: Ulid,
    /// `(reservation id, interval)`, sorted by `interval.start`.
    entries: Vec<(Ulid, Interval)>,
}

impl AvailabilityIndex {
    /// Reservations for other listings are ignored.
    pub fn build(listing: &Listing, reservations: &[Reservation]) -> Self {
        let mut entries: Vec<(Ulid, Interval)> = reservations
            .iter()
            .filter(|r| r.listing_id == listing.id)
            .map(|r| (r.id, r.interval))
            .collect();
        entries.sort_by_key(|(id, i)| (i.start, i.end, *id));
        Self {
            listing_id: listing.id,
            entries,
        }
    }

    pub fn listing_id(&self) -> Ulid {
        self.listing_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_available(&self, candidate: &Interval) -> bool {
        self.conflict(candidate).is_none()
    }

    /// First stored reservation (latest check-in first) that overlaps `candidate`.
    pub fn conflict(&self, candidate: &Interval) -> Option<Ulid> {
        // Entries at index >= right_bound check in on or after candidate.end.
        let right_bound = self
            .entries
            .partition_point(|(_, i)| i.start < candidate.end);
        self.entries[..right_bound]
            .iter()
            .rev()
            .find(|(_, i)| i.overlaps(candidate))
            .map(|(id, _)| *id)
    }

    /// Every calendar day touched by a stored stay, check-out day included.
    pub fn blocked_dates(&self) -> BTreeSet<Day> {
        self.entries
            .iter()
            .flat_map(|(_, interval)| interval.days())
            .collect()
    }

    /// Maximal runs of free nights inside `window`, as half-open intervals.
    pub fn free_intervals(&self, window: &Interval) -> Vec<Interval> {
        let booked: Vec<Interval> = self
            .entries
            .iter()
            .map(|(_, i)| *i)
            .filter(|i| i.overlaps(window))
            .collect();
        subtract_intervals(&[*window], &merge_overlapping(&booked))
    }
}

/// Merge sorted intervals that overlap or touch.
pub fn merge_overlapping(sorted: &[Interval]) -> Vec<Interval> {
    let mut merged: Vec<Interval> = Vec::with_capacity(sorted.len());
    for interval in sorted {
        if let Some(last) = merged.last_mut()
            && interval.start <= last.end
        {
            last.end = last.end.max(interval.end);
            continue;
        }
        merged.push(*interval);
    }
    merged
}

/// Subtract sorted, merged `removals` from sorted `base`.
pub fn subtract_intervals(base: &[Interval], removals: &[Interval]) -> Vec<Interval> {
    let mut result = Vec::new();
    let mut j = 0;

    for b in base {
        let mut current_start = b.start;
        let end = b.end;

        while j < removals.len() && removals[j].end <= current_start {
            j += 1;
        }

        let mut k = j;
        while k < removals.len() && removals[k].start < end {
            let r = &removals[k];
            if r.start > current_start {
                result.push(Interval {
                    start: current_start,
                    end: r.start,
                });
            }
            current_start = current_start.max(r.end);
            k += 1;
        }

        if current_start < end {
            result.push(Interval {
                start: current_start,
                end,
            });
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::*;
    use proptest::prelude::*;

    #[test]
    fn empty_index_is_fully_available() {
        let listing = listing_with_price(100);
        let index = AvailabilityIndex::build(&listing, &[]);
        assert!(index.is_empty());
        assert!(index.is_available(&iv(day(2024, 1, 1), day(2024, 12, 31))));
        assert!(index.blocked_dates().is_empty());
    }

    #[test]
    fn build_ignores_other_listings() {
        let listing = listing_with_price(100);
        let other = listing_with_price(100);
        let reservations = vec![
            reservation(other.id, day(2024, 1, 10), day(2024, 1, 12)),
            reservation(listing.id, day(2024, 2, 10), day(2024, 2, 12)),
        ];
        let index = AvailabilityIndex::build(&listing, &reservations);
        assert_eq!(index.len(), 1);
        assert_eq!(index.listing_id(), listing.id);
        assert!(index.is_available(&iv(day(2024, 1, 10), day(2024, 1, 12))));
    }

    #[test]
    fn identical_and_overlapping_candidates_collide() {
        let listing = listing_with_price(100);
        let existing = reservation(listing.id, day(2024, 1, 10), day(2024, 1, 12));
        let index = AvailabilityIndex::build(&listing, std::slice::from_ref(&existing));

        assert_eq!(
            index.conflict(&iv(day(2024, 1, 10), day(2024, 1, 12))),
            Some(existing.id)
        );
        assert!(!index.is_available(&iv(day(2024, 1, 11), day(2024, 1, 13))));
        assert!(!index.is_available(&iv(day(2024, 1, 1), day(2024, 1, 31))));
        assert!(!index.is_available(&iv(day(2024, 1, 9), day(2024, 1, 11))));
    }

    #[test]
    fn touching_candidates_are_available() {
        let listing = listing_with_price(100);
        let index = AvailabilityIndex::build(
            &listing,
            &[reservation(listing.id, day(2024, 1, 10), day(2024, 1, 12))],
        );
        assert!(index.is_available(&iv(day(2024, 1, 12), day(2024, 1, 15))));
        assert!(index.is_available(&iv(day(2024, 1, 8), day(2024, 1, 10))));
    }

    #[test]
    fn long_stay_found_behind_later_short_ones() {
        let listing = listing_with_price(100);
        let long = reservation(listing.id, day(2024, 1, 1), day(2024, 3, 1));
        let index = AvailabilityIndex::build(
            &listing,
            &[
                long.clone(),
                reservation(listing.id, day(2024, 3, 1), day(2024, 3, 2)),
                reservation(listing.id, day(2024, 3, 5), day(2024, 3, 6)),
            ],
        );
        assert_eq!(
            index.conflict(&iv(day(2024, 2, 20), day(2024, 2, 22))),
            Some(long.id)
        );
    }

    #[test]
    fn blocked_dates_union_is_order_independent() {
        let listing = listing_with_price(100);
        let a = reservation(listing.id, day(2024, 1, 10), day(2024, 1, 12));
        let b = reservation(listing.id, day(2024, 1, 12), day(2024, 1, 13));
        let forward = AvailabilityIndex::build(&listing, &[a.clone(), b.clone()]);
        let backward = AvailabilityIndex::build(&listing, &[b, a]);

        let blocked = forward.blocked_dates();
        assert_eq!(blocked, backward.blocked_dates());
        assert_eq!(
            blocked.into_iter().collect::<Vec<_>>(),
            vec![day(2024, 1, 10), day(2024, 1, 11), day(2024, 1, 12), day(2024, 1, 13)]
        );
    }

    #[test]
    fn free_intervals_between_stays() {
        let listing = listing_with_price(100);
        let index = AvailabilityIndex::build(
            &listing,
            &[
                reservation(listing.id, day(2024, 1, 5), day(2024, 1, 8)),
                reservation(listing.id, day(2024, 1, 8), day(2024, 1, 10)),
                reservation(listing.id, day(2024, 1, 20), day(2024, 2, 5)),
            ],
        );
        let free = index.free_intervals(&iv(day(2024, 1, 1), day(2024, 2, 1)));
        assert_eq!(
            free,
            vec![
                iv(day(2024, 1, 1), day(2024, 1, 5)),
                iv(day(2024, 1, 10), day(2024, 1, 20)),
            ]
        );
    }

    #[test]
    fn merge_empty() {
        assert!(merge_overlapping(&[]).is_empty());
    }

    #[test]
    fn subtract_empty_removals() {
        let base = vec![iv(day(2024, 1, 1), day(2024, 1, 5))];
        assert_eq!(subtract_intervals(&base, &[]), base);
    }

    fn arb_interval() -> impl Strategy<Value = Interval> {
        (0u64..120, 1u64..15).prop_map(|(offset, nights)| {
            let start = day(2024, 1, 1) + chrono::Days::new(offset);
            iv(start, start + chrono::Days::new(nights))
        })
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric(a in arb_interval(), b in arb_interval()) {
            prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
            prop_assert!(a.overlaps(&a));
        }

        #[test]
        fn availability_matches_pairwise_overlap(
            stays in prop::collection::vec(arb_interval(), 0..12),
            candidate in arb_interval(),
        ) {
            let listing = listing_with_price(100);
            let reservations: Vec<Reservation> = stays
                .iter()
                .map(|i| reservation(listing.id, i.start, i.end))
                .collect();
            let index = AvailabilityIndex::build(&listing, &reservations);

            let expected = !stays.iter().any(|s| s.overlaps(&candidate));
            prop_assert_eq!(index.is_available(&candidate), expected);
            if let Some(id) = index.conflict(&candidate) {
                let hit = reservations.iter().find(|r| r.id == id).unwrap();
                prop_assert!(hit.interval.overlaps(&candidate));
            }

            let again = AvailabilityIndex::build(&listing, &reservations);
            prop_assert_eq!(index.blocked_dates(), again.blocked_dates());
        }
    }
}
