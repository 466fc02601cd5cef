use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{RwLock, oneshot};
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_no_conflict, validate_interval};
use super::{Engine, EngineError, WalCommand};

/// Case-insensitive key used for uniqueness.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn require_text(value: &str, field: &'static str, max_len: usize) -> Result<(), EngineError> {
    if value.trim().is_empty() {
        return Err(EngineError::InvalidField {
            field,
            reason: "must not be empty",
        });
    }
    if value.len() > max_len {
        return Err(EngineError::InvalidField {
            field,
            reason: "too long",
        });
    }
    Ok(())
}

fn require_count(value: u32, field: &'static str, max: u32) -> Result<(), EngineError> {
    if value == 0 {
        return Err(EngineError::InvalidField {
            field,
            reason: "must be at least 1",
        });
    }
    if value > max {
        return Err(EngineError::InvalidField {
            field,
            reason: "too large",
        });
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), EngineError> {
    require_text(email, "email", MAX_EMAIL_LEN)?;
    let invalid = EngineError::InvalidField {
        field: "email",
        reason: "not an email address",
    };
    let Some((local, domain)) = email.split_once('@') else {
        return Err(invalid);
    };
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.chars().any(char::is_whitespace)
    {
        return Err(invalid);
    }
    Ok(())
}

/// Every field is mandatory; the first bad one rejects the whole form.
fn validate_new_listing(form: &NewListing) -> Result<Category, EngineError> {
    require_text(&form.title, "title", MAX_TITLE_LEN)?;
    require_text(&form.description, "description", MAX_DESCRIPTION_LEN)?;
    require_text(&form.image_src, "image_src", MAX_IMAGE_SRC_LEN)?;
    let category = form.category.parse::<Category>()?;
    require_count(form.room_count, "room_count", MAX_ROOM_COUNT)?;
    require_count(form.bathroom_count, "bathroom_count", MAX_ROOM_COUNT)?;
    require_count(form.guest_count, "guest_count", MAX_GUEST_COUNT)?;
    let loc = form.location_value.trim();
    if loc.len() != 2 || !loc.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(EngineError::InvalidField {
            field: "location_value",
            reason: "expected a two-letter country code",
        });
    }
    if form.nightly_price < 1 {
        return Err(EngineError::InvalidField {
            field: "nightly_price",
            reason: "must be at least 1",
        });
    }
    if form.nightly_price > MAX_NIGHTLY_PRICE {
        return Err(EngineError::InvalidField {
            field: "nightly_price",
            reason: "too large",
        });
    }
    Ok(category)
}

impl Engine {
    pub async fn register_user(&self, name: &str, email: &str) -> Result<User, EngineError> {
        require_text(name, "name", MAX_NAME_LEN)?;
        validate_email(email.trim())?;
        let key = normalize_email(email);

        let _registration = self.registration.lock().await;
        let _compaction = self.compaction.read().await;
        if self.users.len() >= MAX_USERS {
            return Err(EngineError::LimitExceeded("too many users"));
        }
        if self.emails.contains_key(&key) {
            return Err(EngineError::EmailTaken(key));
        }

        let user = User {
            id: Ulid::new(),
            name: name.trim().to_string(),
            email: key.clone(),
            favorite_ids: Vec::new(),
            created_at: Utc::now(),
        };
        let event = Event::UserRegistered {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            created_at: user.created_at,
        };
        self.wal_append(&event).await?;
        self.emails.insert(key, user.id);
        self.users
            .insert(user.id, Arc::new(RwLock::new(user.clone())));
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Create a listing owned by `requester`. The form is rejected outright
    /// if any field is missing or out of range.
    pub async fn create_listing(
        &self,
        requester: Option<Ulid>,
        form: NewListing,
    ) -> Result<Listing, EngineError> {
        let owner_id = requester.ok_or(EngineError::Unauthenticated)?;
        if !self.users.contains_key(&owner_id) {
            return Err(EngineError::NotFound(owner_id));
        }
        let category = validate_new_listing(&form)?;

        let listing = Listing {
            id: Ulid::new(),
            owner_id,
            title: form.title.trim().to_string(),
            description: form.description.trim().to_string(),
            image_src: form.image_src.trim().to_string(),
            category,
            room_count: form.room_count,
            bathroom_count: form.bathroom_count,
            guest_count: form.guest_count,
            location_value: form.location_value.trim().to_ascii_uppercase(),
            nightly_price: form.nightly_price,
            created_at: Utc::now(),
        };
        let event = Event::ListingCreated {
            listing: listing.clone(),
        };
        // Held until the insert so the cap check can't race another create.
        let _catalogue = self.catalogue.lock().await;
        let _compaction = self.compaction.read().await;
        if self.listings.len() >= self.max_listings {
            return Err(EngineError::LimitExceeded("too many listings"));
        }
        self.wal_append(&event).await?;
        self.listings.insert(
            listing.id,
            Arc::new(RwLock::new(ListingState::new(listing.clone()))),
        );
        self.notify.send(listing.id, &event);
        metrics::gauge!(crate::observability::LISTINGS_ACTIVE).set(self.listings.len() as f64);
        info!(listing_id = %listing.id, owner_id = %owner_id, "listing created");
        Ok(listing)
    }

    /// Mark `listing_id` as a favorite of `requester`. Favoriting twice is a no-op.
    pub async fn add_favorite(&self, requester: Option<Ulid>, listing_id: Ulid) -> Result<User, EngineError> {
        let user_id = requester.ok_or(EngineError::Unauthenticated)?;
        if !self.listings.contains_key(&listing_id) {
            return Err(EngineError::NotFound(listing_id));
        }
        let user_rs = self
            .get_user_state(&user_id)
            .ok_or(EngineError::NotFound(user_id))?;
        let _compaction = self.compaction.read().await;
        let mut guard = user_rs.write().await;
        if guard.has_favorited(&listing_id) {
            return Ok(guard.clone());
        }
        if guard.favorite_ids.len() >= MAX_FAVORITES_PER_USER {
            return Err(EngineError::LimitExceeded("too many favorites"));
        }
        let event = Event::FavoriteAdded { user_id, listing_id };
        self.persist_to_user(&mut guard, &event).await?;
        debug!(%user_id, %listing_id, "favorite added");
        Ok(guard.clone())
    }

    /// Removing a listing that isn't a favorite is a no-op.
    pub async fn remove_favorite(&self, requester: Option<Ulid>, listing_id: Ulid) -> Result<User, EngineError> {
        let user_id = requester.ok_or(EngineError::Unauthenticated)?;
        let user_rs = self
            .get_user_state(&user_id)
            .ok_or(EngineError::NotFound(user_id))?;
        let _compaction = self.compaction.read().await;
        let mut guard = user_rs.write().await;
        if !guard.has_favorited(&listing_id) {
            return Ok(guard.clone());
        }
        let event = Event::FavoriteRemoved { user_id, listing_id };
        self.persist_to_user(&mut guard, &event).await?;
        debug!(%user_id, %listing_id, "favorite removed");
        Ok(guard.clone())
    }

    /// Persist a fully-formed reservation. Overlap is re-checked under the
    /// listing write lock, so this is the last line against double booking.
    pub async fn create_reservation(&self, reservation: Reservation) -> Result<Reservation, EngineError> {
        validate_interval(&reservation.interval, self.max_stay_nights)?;
        if reservation.total_price < 0 {
            return Err(EngineError::InvalidField {
                field: "total_price",
                reason: "must not be negative",
            });
        }
        if self.reservation_to_listing.contains_key(&reservation.id) {
            return Err(EngineError::AlreadyExists(reservation.id));
        }
        if !self.users.contains_key(&reservation.user_id) {
            return Err(EngineError::NotFound(reservation.user_id));
        }
        let ls = self
            .get_listing_state(&reservation.listing_id)
            .ok_or(EngineError::NotFound(reservation.listing_id))?;
        let _compaction = self.compaction.read().await;
        let mut guard = ls.write().await;
        if guard.reservations.len() >= MAX_RESERVATIONS_PER_LISTING {
            return Err(EngineError::LimitExceeded("too many reservations on listing"));
        }

        check_no_conflict(&guard, &reservation.interval)?;

        self.persist_reservation(&mut guard, reservation.clone()).await?;
        info!(
            reservation_id = %reservation.id,
            listing_id = %reservation.listing_id,
            interval = %reservation.interval,
            total_price = reservation.total_price,
            "reservation created"
        );
        Ok(reservation)
    }

    /// Rewrite the WAL as the minimal event list that recreates current state.
    pub async fn compact(&self) -> Result<(), EngineError> {
        let _exclusive = self.compaction.write().await;
        let mut events = Vec::new();
        let mut seen_users = HashSet::new();

        let user_states: Vec<_> = self.users.iter().map(|e| e.value().clone()).collect();
        let mut favorites = Vec::new();
        for rs in user_states {
            let user = rs.read().await;
            if !seen_users.insert(user.id) {
                continue;
            }
            events.push(Event::UserRegistered {
                id: user.id,
                name: user.name.clone(),
                email: user.email.clone(),
                created_at: user.created_at,
            });
            for listing_id in &user.favorite_ids {
                favorites.push(Event::FavoriteAdded {
                    user_id: user.id,
                    listing_id: *listing_id,
                });
            }
        }

        let listing_states: Vec<_> = self.listings.iter().map(|e| e.value().clone()).collect();
        let mut reservations = Vec::new();
        for ls in listing_states {
            let guard = ls.read().await;
            events.push(Event::ListingCreated {
                listing: guard.listing.clone(),
            });
            for r in &guard.reservations {
                reservations.push(Event::ReservationCreated {
                    reservation: r.clone(),
                });
            }
        }
        events.extend(favorites);
        events.extend(reservations);
        let count = events.len();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::PersistenceFailure("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::PersistenceFailure("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::PersistenceFailure(e.to_string()))?;
        info!(events = count, "WAL compacted");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::new_listing_form as form;

    #[test]
    fn valid_form_passes() {
        assert_eq!(validate_new_listing(&form()).unwrap(), Category::Lake);
    }

    #[test]
    fn empty_fields_are_rejected() {
        let mut f = form();
        f.title = "   ".into();
        assert!(matches!(
            validate_new_listing(&f),
            Err(EngineError::InvalidField { field: "title", .. })
        ));

        let mut f = form();
        f.guest_count = 0;
        assert!(matches!(
            validate_new_listing(&f),
            Err(EngineError::InvalidField { field: "guest_count", .. })
        ));

        let mut f = form();
        f.nightly_price = 0;
        assert!(matches!(
            validate_new_listing(&f),
            Err(EngineError::InvalidField { field: "nightly_price", .. })
        ));

        let mut f = form();
        f.location_value = "FIN".into();
        assert!(matches!(
            validate_new_listing(&f),
            Err(EngineError::InvalidField { field: "location_value", .. })
        ));

        let mut f = form();
        f.category = String::new();
        assert!(matches!(
            validate_new_listing(&f),
            Err(EngineError::InvalidField { field: "category", .. })
        ));
    }

    #[test]
    fn email_shapes() {
        assert!(validate_email("a@b.io").is_ok());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("@b.io").is_err());
        assert!(validate_email("a@@b.io").is_err());
        assert!(validate_email("a b@c.io").is_err());
        assert!(validate_email("").is_err());
        assert_eq!(normalize_email("  Ann@Example.COM "), "ann@example.com");
    }
}
