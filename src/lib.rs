pub mod auth;
pub mod compactor;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod pricing;
pub mod store;
pub mod wal;
pub mod workflow;

pub use engine::{Engine, EngineError, StorageError};
pub use model::{Category, Day, Interval, Listing, NewListing, Reservation, ReservationQuery, User};
pub use workflow::BookingWorkflow;
