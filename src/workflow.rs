use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};
use ulid::Ulid;

use crate::auth::IdentitySource;
use crate::engine::{AvailabilityIndex, EngineError, validate_interval};
use crate::limits::MAX_STAY_NIGHTS;
use crate::model::{Interval, Listing, Reservation};
use crate::observability::{SUBMISSIONS_TOTAL, SUBMIT_DURATION_SECONDS};
use crate::pricing::{NightlyRate, PricingStrategy, Quote, quote};
use crate::store::ReservationStore;

/// Where a booking attempt is. `Committed` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStage {
    Requested,
    Validated,
    Priced,
    Committed,
    Rejected,
}

/// Validates, prices and commits reservations against a [`ReservationStore`].
///
/// Attempts on the same listing are serialized from the availability check
/// through the commit; attempts on different listings run independently.
pub struct BookingWorkflow<S: ?Sized> {
    store: Arc<S>,
    pricing: Arc<dyn PricingStrategy>,
    max_stay_nights: i64,
    listing_locks: DashMap<Ulid, Arc<Mutex<()>>>,
}

impl<S: ReservationStore + ?Sized> BookingWorkflow<S> {
    /// Stays are capped at the store's own limit, or [`MAX_STAY_NIGHTS`]
    /// when the store has none.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            max_stay_nights: store.max_stay_nights().unwrap_or(MAX_STAY_NIGHTS),
            store,
            pricing: Arc::new(NightlyRate),
            listing_locks: DashMap::new(),
        }
    }

    pub fn with_pricing(mut self, pricing: Arc<dyn PricingStrategy>) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_max_stay_nights(mut self, nights: i64) -> Self {
        self.max_stay_nights = nights;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// What `submit` would charge, without touching the store.
    pub fn quote(&self, listing: &Listing, candidate: &Interval) -> Result<Quote, EngineError> {
        quote(self.pricing.as_ref(), listing, candidate)
    }

    /// Resolve the requester through `identity`, then [`submit`](Self::submit).
    pub async fn submit_as(
        &self,
        identity: &dyn IdentitySource,
        listing: &Listing,
        candidate: Interval,
    ) -> Result<Reservation, EngineError> {
        let requester = identity.current_requester().await;
        self.submit(listing, requester, candidate).await
    }

    /// Book `candidate` on `listing` for `requester`.
    ///
    /// Rejections: `Unauthenticated` (no requester, store untouched),
    /// `InvalidInterval`/`LimitExceeded` (bad candidate), `DateConflict`
    /// (overlaps an existing stay), `PersistenceFailure` (store error, safe
    /// to retry). Nothing is written unless the result is `Ok`.
    pub async fn submit(
        &self,
        listing: &Listing,
        requester: Option<Ulid>,
        candidate: Interval,
    ) -> Result<Reservation, EngineError> {
        let started = Instant::now();
        let result = self.run(listing, requester, candidate).await;

        let outcome = match &result {
            Ok(_) => "committed",
            Err(e) => e.kind(),
        };
        metrics::counter!(SUBMISSIONS_TOTAL, "outcome" => outcome).increment(1);
        metrics::histogram!(SUBMIT_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        match &result {
            Ok(r) => info!(
                reservation_id = %r.id,
                listing_id = %listing.id,
                interval = %r.interval,
                total_price = r.total_price,
                "reservation committed"
            ),
            Err(e) => debug!(
                stage = ?SubmitStage::Rejected,
                listing_id = %listing.id,
                reason = %e,
                "reservation rejected"
            ),
        }
        result
    }

    async fn run(
        &self,
        listing: &Listing,
        requester: Option<Ulid>,
        candidate: Interval,
    ) -> Result<Reservation, EngineError> {
        debug!(stage = ?SubmitStage::Requested, listing_id = %listing.id, interval = %candidate);
        let user_id = requester.ok_or(EngineError::Unauthenticated)?;
        validate_interval(&candidate, self.max_stay_nights)?;
        debug!(stage = ?SubmitStage::Validated, listing_id = %listing.id);

        let lock = self.listing_lock(listing.id);
        let _serial = lock.lock().await;

        let existing = self.store.list_by_listing(listing.id).await?;
        let index = AvailabilityIndex::build(listing, &existing);
        if let Some(conflicting) = index.conflict(&candidate) {
            return Err(EngineError::DateConflict(conflicting));
        }

        let total_price = self.pricing.total(listing, &candidate)?;
        debug!(stage = ?SubmitStage::Priced, listing_id = %listing.id, total_price);

        let reservation = Reservation {
            id: Ulid::new(),
            listing_id: listing.id,
            user_id,
            interval: candidate,
            total_price,
            created_at: Utc::now(),
        };
        let committed = self.store.create(reservation).await?;
        debug!(stage = ?SubmitStage::Committed, reservation_id = %committed.id);
        Ok(committed)
    }

    fn listing_lock(&self, listing_id: Ulid) -> Arc<Mutex<()>> {
        self.listing_locks
            .entry(listing_id)
            .or_default()
            .value()
            .clone()
    }
}
