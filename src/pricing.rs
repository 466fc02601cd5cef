use serde::{Deserialize, Serialize};

use crate::engine::EngineError;
use crate::model::{Interval, Listing};

/// Turns a listing and a stay into a total price.
///
/// Implementations must be pure: the workflow may price the same candidate
/// more than once and expects the same answer.
pub trait PricingStrategy: Send + Sync {
    fn total(&self, listing: &Listing, candidate: &Interval) -> Result<i64, EngineError>;
}

/// Nights × nightly price.
#[derive(Debug, Clone, Copy, Default)]
pub struct NightlyRate;

impl PricingStrategy for NightlyRate {
    fn total(&self, listing: &Listing, candidate: &Interval) -> Result<i64, EngineError> {
        compute_total(listing, candidate)
    }
}

pub fn compute_total(listing: &Listing, candidate: &Interval) -> Result<i64, EngineError> {
    let nights = candidate.day_count()?;
    nights
        .checked_mul(listing.nightly_price)
        .ok_or(EngineError::LimitExceeded("total price overflow"))
}

/// Price breakdown shown next to the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub nights: i64,
    pub nightly_price: i64,
    pub total: i64,
}

pub fn quote(
    strategy: &dyn PricingStrategy,
    listing: &Listing,
    candidate: &Interval,
) -> Result<Quote, EngineError> {
    Ok(Quote {
        nights: candidate.day_count()?,
        nightly_price: listing.nightly_price,
        total: strategy.total(listing, candidate)?,
    })
}
