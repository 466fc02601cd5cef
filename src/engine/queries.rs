use std::cmp::Reverse;
use std::collections::BTreeSet;

use ulid::Ulid;

use crate::model::*;

use super::availability::AvailabilityIndex;
use super::mutations::normalize_email;
use super::{Engine, EngineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    pub users: usize,
    pub listings: usize,
    pub reservations: usize,
}

impl Engine {
    pub async fn get_listing(&self, id: Ulid) -> Option<Listing> {
        let ls = self.get_listing_state(&id)?;
        let guard = ls.read().await;
        Some(guard.listing.clone())
    }

    pub async fn get_listing_with_owner(&self, id: Ulid) -> Option<ListingWithOwner> {
        let listing = self.get_listing(id).await?;
        let owner = self.get_user(listing.owner_id).await?;
        Some(ListingWithOwner { listing, owner })
    }

    /// All listings, newest first, optionally narrowed to one category.
    pub async fn list_listings(&self, category: Option<Category>) -> Vec<Listing> {
        let states: Vec<_> = self.listings.iter().map(|e| e.value().clone()).collect();
        let mut listings = Vec::with_capacity(states.len());
        for ls in states {
            let guard = ls.read().await;
            if category.is_none_or(|c| guard.listing.category == c) {
                listings.push(guard.listing.clone());
            }
        }
        listings.sort_by_key(|l| Reverse((l.created_at, l.id)));
        listings
    }

    pub async fn get_user(&self, id: Ulid) -> Option<User> {
        let user = self.get_user_state(&id)?;
        let guard = user.read().await;
        Some(guard.clone())
    }

    pub async fn find_user_by_email(&self, email: &str) -> Option<User> {
        let id = *self.emails.get(&normalize_email(email))?.value();
        self.get_user(id).await
    }

    pub async fn has_favorited(&self, user_id: Ulid, listing_id: Ulid) -> bool {
        match self.get_user_state(&user_id) {
            Some(user) => user.read().await.has_favorited(&listing_id),
            None => false,
        }
    }

    /// Favorite listings in the order they were favorited.
    pub async fn favorite_listings(&self, user_id: Ulid) -> Result<Vec<Listing>, EngineError> {
        let user = self
            .get_user(user_id)
            .await
            .ok_or(EngineError::NotFound(user_id))?;
        let mut listings = Vec::with_capacity(user.favorite_ids.len());
        for id in user.favorite_ids {
            if let Some(listing) = self.get_listing(id).await {
                listings.push(listing);
            }
        }
        Ok(listings)
    }

    pub async fn get_reservation(&self, id: Ulid) -> Option<Reservation> {
        let listing_id = *self.reservation_to_listing.get(&id)?.value();
        let ls = self.get_listing_state(&listing_id)?;
        let guard = ls.read().await;
        guard.reservations.iter().find(|r| r.id == id).cloned()
    }

    /// Reservations matching every filter in `query`, joined with their
    /// listing, newest first.
    pub async fn get_reservations(&self, query: ReservationQuery) -> Vec<ReservationDetails> {
        let states: Vec<_> = match query.listing_id {
            Some(id) => self.get_listing_state(&id).into_iter().collect(),
            None => self.listings.iter().map(|e| e.value().clone()).collect(),
        };

        let mut out = Vec::new();
        for ls in states {
            let guard = ls.read().await;
            if query.owner_id.is_some_and(|owner| guard.listing.owner_id != owner) {
                continue;
            }
            for r in &guard.reservations {
                if query.matches(r, &guard.listing) {
                    out.push(ReservationDetails {
                        reservation: r.clone(),
                        listing: guard.listing.clone(),
                    });
                }
            }
        }
        out.sort_by_key(|d| Reverse((d.reservation.created_at, d.reservation.id)));
        out
    }

    /// Snapshot of a listing's booked stays.
    pub async fn availability_index(&self, listing_id: Ulid) -> Result<AvailabilityIndex, EngineError> {
        let ls = self
            .get_listing_state(&listing_id)
            .ok_or(EngineError::NotFound(listing_id))?;
        let guard = ls.read().await;
        Ok(AvailabilityIndex::build(&guard.listing, &guard.reservations))
    }

    /// Days to disable in the listing's calendar.
    pub async fn blocked_dates(&self, listing_id: Ulid) -> Result<BTreeSet<Day>, EngineError> {
        Ok(self.availability_index(listing_id).await?.blocked_dates())
    }

    /// Unbooked stretches of the listing inside `window`.
    pub async fn free_intervals(&self, listing_id: Ulid, window: Interval) -> Result<Vec<Interval>, EngineError> {
        window.day_count()?;
        Ok(self.availability_index(listing_id).await?.free_intervals(&window))
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            users: self.users.len(),
            listings: self.listings.len(),
            reservations: self.reservation_to_listing.len(),
        }
    }
}
