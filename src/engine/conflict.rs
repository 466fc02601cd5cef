use crate::limits::*;
use crate::model::*;

use super::EngineError;

/// Shape check plus configured limits for a candidate stay.
pub(crate) fn validate_interval(interval: &Interval, max_stay_nights: i64) -> Result<i64, EngineError> {
    let nights = interval.day_count()?;
    if interval.start < MIN_VALID_DATE || interval.end > MAX_VALID_DATE {
        return Err(EngineError::LimitExceeded("date out of range"));
    }
    if nights > max_stay_nights {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(nights)
}

/// Any existing reservation sharing a night with `interval` is a conflict.
pub(crate) fn check_no_conflict(ls: &ListingState, interval: &Interval) -> Result<(), EngineError> {
    match ls.overlapping(interval).next() {
        Some(existing) => Err(EngineError::DateConflict(existing.id)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::*;

    #[test]
    fn validate_accepts_normal_stay() {
        let nights = validate_interval(&iv(day(2024, 1, 10), day(2024, 1, 15)), MAX_STAY_NIGHTS).unwrap();
        assert_eq!(nights, 5);
    }

    #[test]
    fn validate_rejects_shape_before_limits() {
        let d = day(1900, 1, 1);
        assert!(matches!(
            validate_interval(&iv(d, d), MAX_STAY_NIGHTS),
            Err(EngineError::InvalidInterval { .. })
        ));
    }

    #[test]
    fn validate_rejects_out_of_range_dates() {
        let result = validate_interval(&iv(day(1999, 12, 30), day(2000, 1, 2)), MAX_STAY_NIGHTS);
        assert!(matches!(result, Err(EngineError::LimitExceeded("date out of range"))));
    }

    #[test]
    fn validate_rejects_long_stay() {
        let result = validate_interval(&iv(day(2024, 1, 1), day(2024, 1, 31)), 14);
        assert!(matches!(result, Err(EngineError::LimitExceeded("stay too long"))));
        // Exactly at the limit is fine.
        assert!(validate_interval(&iv(day(2024, 1, 1), day(2024, 1, 15)), 14).is_ok());
    }

    #[test]
    fn conflict_reports_existing_reservation() {
        let listing = listing_with_price(100);
        let mut ls = ListingState::new(listing.clone());
        let existing = reservation(listing.id, day(2024, 1, 10), day(2024, 1, 12));
        ls.insert_reservation(existing.clone());

        let err = check_no_conflict(&ls, &iv(day(2024, 1, 11), day(2024, 1, 13))).unwrap_err();
        assert!(matches!(err, EngineError::DateConflict(id) if id == existing.id));
        assert!(check_no_conflict(&ls, &iv(day(2024, 1, 12), day(2024, 1, 13))).is_ok());
    }
}
