use async_trait::async_trait;
use ulid::Ulid;

use crate::model::Reservation;
use crate::store::ReservationStore;

use super::{Engine, StorageError};

#[async_trait]
impl ReservationStore for Engine {
    async fn list_by_listing(&self, listing_id: Ulid) -> Result<Vec<Reservation>, StorageError> {
        let ls = self
            .get_listing_state(&listing_id)
            .ok_or(StorageError::NotFound(listing_id))?;
        let guard = ls.read().await;
        Ok(guard.reservations.clone())
    }

    async fn create(&self, reservation: Reservation) -> Result<Reservation, StorageError> {
        Ok(self.create_reservation(reservation).await?)
    }

    fn max_stay_nights(&self) -> Option<i64> {
        Some(Engine::max_stay_nights(self))
    }
}
