use async_trait::async_trait;
use ulid::Ulid;

use crate::engine::StorageError;
use crate::model::Reservation;

/// Where reservations live. The booking workflow only ever talks to this.
///
/// `create` must refuse a reservation overlapping an existing one for the
/// same listing with [`StorageError::Conflict`]; the workflow relies on it as
/// the final guard when several workflows share one store.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn list_by_listing(&self, listing_id: Ulid) -> Result<Vec<Reservation>, StorageError>;

    async fn create(&self, reservation: Reservation) -> Result<Reservation, StorageError>;

    /// Longest stay `create` will accept, if the store enforces one. A
    /// workflow built over the store starts from this limit.
    fn max_stay_nights(&self) -> Option<i64> {
        None
    }
}
