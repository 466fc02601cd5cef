use std::fmt;
use std::iter::FusedIterator;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::EngineError;

/// Calendar date, the only day type.
pub type Day = NaiveDate;

/// Stay interval `[start, end)`: `start` is check-in, `end` is check-out.
///
/// Fields are public so callers can carry a raw candidate around; anything
/// that reaches the store goes through [`Interval::try_new`] or
/// [`Interval::day_count`], which reject `end <= start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: Day,
    pub end: Day,
}

impl Interval {
    pub fn try_new(start: Day, end: Day) -> Result<Self, EngineError> {
        let interval = Self { start, end };
        interval.day_count()?;
        Ok(interval)
    }

    /// Number of nights. Fails if the interval is empty or inverted.
    pub fn day_count(&self) -> Result<i64, EngineError> {
        let nights = (self.end - self.start).num_days();
        if nights < 1 {
            return Err(EngineError::InvalidInterval {
                start: self.start,
                end: self.end,
            });
        }
        Ok(nights)
    }

    /// Two stays overlap iff they share a night. Checking out on the day
    /// someone else checks in is fine.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Every calendar day from `start` through `end`, both inclusive.
    pub fn days(&self) -> Days {
        Days {
            next: Some(self.start),
            last: self.end,
        }
    }

    /// Whether a guest is in residence on `day`; the checkout day is not included.
    pub fn contains_day(&self, day: Day) -> bool {
        self.start <= day && day < self.end
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

pub fn day_count(interval: &Interval) -> Result<i64, EngineError> {
    interval.day_count()
}

pub fn enumerate_days(interval: &Interval) -> Days {
    interval.days()
}

pub fn overlaps(a: &Interval, b: &Interval) -> bool {
    a.overlaps(b)
}

/// Lazy day iterator returned by [`Interval::days`]. Empty when `end < start`.
#[derive(Debug, Clone)]
pub struct Days {
    next: Option<Day>,
    last: Day,
}

impl Iterator for Days {
    type Item = Day;

    fn next(&mut self) -> Option<Day> {
        let day = self.next.filter(|d| *d <= self.last)?;
        self.next = day.succ_opt();
        Some(day)
    }
}

impl FusedIterator for Days {}

/// Listing categories offered by the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Beach,
    Windmills,
    Modern,
    Countryside,
    Pools,
    Islands,
    Lake,
    Skiing,
    Castles,
    Caves,
    Camping,
    Arctic,
    Desert,
    Barns,
    Lux,
}

impl Category {
    pub const ALL: [Category; 15] = [
        Category::Beach,
        Category::Windmills,
        Category::Modern,
        Category::Countryside,
        Category::Pools,
        Category::Islands,
        Category::Lake,
        Category::Skiing,
        Category::Castles,
        Category::Caves,
        Category::Camping,
        Category::Arctic,
        Category::Desert,
        Category::Barns,
        Category::Lux,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Beach => "Beach",
            Category::Windmills => "Windmills",
            Category::Modern => "Modern",
            Category::Countryside => "Countryside",
            Category::Pools => "Pools",
            Category::Islands => "Islands",
            Category::Lake => "Lake",
            Category::Skiing => "Skiing",
            Category::Castles => "Castles",
            Category::Caves => "Caves",
            Category::Camping => "Camping",
            Category::Arctic => "Arctic",
            Category::Desert => "Desert",
            Category::Barns => "Barns",
            Category::Lux => "Lux",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(s.trim()))
            .ok_or(EngineError::InvalidField {
                field: "category",
                reason: "unknown category",
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: Ulid,
    pub owner_id: Ulid,
    pub title: String,
    pub description: String,
    pub image_src: String,
    pub category: Category,
    pub room_count: u32,
    pub bathroom_count: u32,
    pub guest_count: u32,
    /// ISO 3166-1 alpha-2 country code.
    pub location_value: String,
    /// Price of one night, in minor units.
    pub nightly_price: i64,
    pub created_at: DateTime<Utc>,
}

/// Unvalidated listing form as submitted by an owner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewListing {
    pub title: String,
    pub description: String,
    pub image_src: String,
    pub category: String,
    pub room_count: u32,
    pub bathroom_count: u32,
    pub guest_count: u32,
    pub location_value: String,
    pub nightly_price: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Ulid,
    pub name: String,
    pub email: String,
    /// Each listing appears at most once.
    pub favorite_ids: Vec<Ulid>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn has_favorited(&self, listing_id: &Ulid) -> bool {
        self.favorite_ids.contains(listing_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub listing_id: Ulid,
    pub user_id: Ulid,
    pub interval: Interval,
    pub total_price: i64,
    pub created_at: DateTime<Utc>,
}

/// A listing plus its reservations, sorted by `interval.start`.
#[derive(Debug, Clone)]
pub struct ListingState {
    pub listing: Listing,
    pub reservations: Vec<Reservation>,
}

impl ListingState {
    pub fn new(listing: Listing) -> Self {
        Self {
            listing,
            reservations: Vec::new(),
        }
    }

    /// Insert reservation maintaining sort order by interval.start.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .binary_search_by_key(&reservation.interval.start, |r| r.interval.start)
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, reservation);
    }

    /// Return only reservations whose interval overlaps the query window.
    pub fn overlapping(&self, query: &Interval) -> impl Iterator<Item = &Reservation> {
        // Everything at index >= right_bound starts at or after query.end.
        let right_bound = self
            .reservations
            .partition_point(|r| r.interval.start < query.end);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.interval.end > query.start)
    }
}

/// WAL record format. Flat, no nesting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    UserRegistered {
        id: Ulid,
        name: String,
        email: String,
        created_at: DateTime<Utc>,
    },
    ListingCreated {
        listing: Listing,
    },
    FavoriteAdded {
        user_id: Ulid,
        listing_id: Ulid,
    },
    FavoriteRemoved {
        user_id: Ulid,
        listing_id: Ulid,
    },
    ReservationCreated {
        reservation: Reservation,
    },
}

// ── Query types ──────────────────────────────────────────────────

/// Reservation filters. Every filter that is set must match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReservationQuery {
    pub listing_id: Option<Ulid>,
    pub user_id: Option<Ulid>,
    /// Owner of the reserved listing.
    pub owner_id: Option<Ulid>,
}

impl ReservationQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn listing(mut self, id: Ulid) -> Self {
        self.listing_id = Some(id);
        self
    }

    pub fn user(mut self, id: Ulid) -> Self {
        self.user_id = Some(id);
        self
    }

    pub fn owner(mut self, id: Ulid) -> Self {
        self.owner_id = Some(id);
        self
    }

    pub fn matches(&self, reservation: &Reservation, listing: &Listing) -> bool {
        self.listing_id.is_none_or(|id| reservation.listing_id == id)
            && self.user_id.is_none_or(|id| reservation.user_id == id)
            && self.owner_id.is_none_or(|id| listing.owner_id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationDetails {
    pub reservation: Reservation,
    pub listing: Listing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingWithOwner {
    pub listing: Listing,
    pub owner: User,
}
