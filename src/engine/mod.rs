mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;
mod store;

pub use availability::{AvailabilityIndex, merge_overlapping, subtract_intervals};
pub(crate) use conflict::validate_interval;
pub use error::{EngineError, StorageError};
pub use queries::EngineStats;

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tracing::info;
use ulid::Ulid;

use crate::config::Config;
use crate::limits::{MAX_LISTINGS, MAX_STAY_NIGHTS, WAL_CHANNEL_CAPACITY};
use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedListingState = Arc<RwLock<ListingState>>;
pub type SharedUser = Arc<RwLock<User>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Drain all immediately available Appends (the batch window).
/// 3. Write the whole batch with one fsync; a failure rolls the log back to
///    its length before the batch, so every sender in it sees the error.
/// 4. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush what we have before handling it.
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                flush_and_respond(&mut wal, &mut batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    respond_batch(batch, &result);
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    wal.append_batch(batch.iter().map(|(event, _)| event))
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the caller"),
    }
}

/// Listings, users and reservations, held in memory and persisted as WAL events.
pub struct Engine {
    pub(super) listings: DashMap<Ulid, SharedListingState>,
    pub(super) users: DashMap<Ulid, SharedUser>,
    /// Normalized email → user id.
    pub(super) emails: DashMap<String, Ulid>,
    /// Reverse lookup: reservation id → listing id.
    pub(super) reservation_to_listing: DashMap<Ulid, Ulid>,
    /// Serializes registrations so two sign-ups can't claim one email.
    pub(super) registration: Mutex<()>,
    /// Serializes listing creation so the catalogue cap holds.
    pub(super) catalogue: Mutex<()>,
    /// Mutations hold this shared (taken before any entity lock) from WAL
    /// append through apply; `compact` holds it exclusively while it
    /// snapshots state, so no committed event can fall between snapshot and swap.
    pub(super) compaction: RwLock<()>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    pub(super) max_stay_nights: i64,
    pub(super) max_listings: usize,
}

/// Replay target: plain maps, wrapped in locks once the log is consumed.
#[derive(Default)]
struct Replayed {
    listings: HashMap<Ulid, ListingState>,
    users: HashMap<Ulid, User>,
}

impl Replayed {
    fn apply(&mut self, event: &Event) {
        match event {
            Event::UserRegistered {
                id,
                name,
                email,
                created_at,
            } => {
                self.users.insert(
                    *id,
                    User {
                        id: *id,
                        name: name.clone(),
                        email: email.clone(),
                        favorite_ids: Vec::new(),
                        created_at: *created_at,
                    },
                );
            }
            Event::ListingCreated { listing } => {
                self.listings
                    .insert(listing.id, ListingState::new(listing.clone()));
            }
            Event::ReservationCreated { reservation } => {
                if let Some(ls) = self.listings.get_mut(&reservation.listing_id) {
                    ls.insert_reservation(reservation.clone());
                }
            }
            other => {
                if let Some(user_id) = event_user_id(other)
                    && let Some(user) = self.users.get_mut(&user_id)
                {
                    apply_to_user(user, other);
                }
            }
        }
    }
}

/// Apply a favorites event to a user (caller holds the lock).
fn apply_to_user(user: &mut User, event: &Event) {
    match event {
        Event::FavoriteAdded { listing_id, .. } => {
            if !user.favorite_ids.contains(listing_id) {
                user.favorite_ids.push(*listing_id);
            }
        }
        Event::FavoriteRemoved { listing_id, .. } => {
            user.favorite_ids.retain(|id| id != listing_id);
        }
        Event::UserRegistered { .. }
        | Event::ListingCreated { .. }
        | Event::ReservationCreated { .. } => {}
    }
}

impl Engine {
    /// Open (or create) the WAL at `wal_path` and replay it.
    /// Must be called from within a tokio runtime.
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        Self::with_max_stay(wal_path, notify, MAX_STAY_NIGHTS)
    }

    /// Open the store under `config.data_dir`, creating the directory if needed.
    pub fn open(config: &Config) -> io::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        Self::with_max_stay(
            config.wal_path(),
            Arc::new(NotifyHub::new()),
            config.max_stay_nights,
        )
    }

    fn with_max_stay(wal_path: PathBuf, notify: Arc<NotifyHub>, max_stay_nights: i64) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(WAL_CHANNEL_CAPACITY);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let mut replayed = Replayed::default();
        for event in &events {
            replayed.apply(event);
        }

        let engine = Self {
            listings: DashMap::new(),
            users: DashMap::new(),
            emails: DashMap::new(),
            reservation_to_listing: DashMap::new(),
            registration: Mutex::new(()),
            catalogue: Mutex::new(()),
            compaction: RwLock::new(()),
            wal_tx,
            notify,
            max_stay_nights,
            max_listings: MAX_LISTINGS,
        };
        for (id, user) in replayed.users {
            engine.emails.insert(user.email.clone(), id);
            engine.users.insert(id, Arc::new(RwLock::new(user)));
        }
        for (id, ls) in replayed.listings {
            for r in &ls.reservations {
                engine.reservation_to_listing.insert(r.id, id);
            }
            engine.listings.insert(id, Arc::new(RwLock::new(ls)));
        }

        info!(
            events = events.len(),
            users = engine.users.len(),
            listings = engine.listings.len(),
            reservations = engine.reservation_to_listing.len(),
            path = %wal_path.display(),
            "store replayed"
        );
        metrics::gauge!(crate::observability::LISTINGS_ACTIVE).set(engine.listings.len() as f64);
        Ok(engine)
    }

    pub fn max_stay_nights(&self) -> i64 {
        self.max_stay_nights
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::PersistenceFailure("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::PersistenceFailure("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::PersistenceFailure(e.to_string()))
    }

    pub fn get_listing_state(&self, id: &Ulid) -> Option<SharedListingState> {
        self.listings.get(id).map(|e| e.value().clone())
    }

    pub(super) fn get_user_state(&self, id: &Ulid) -> Option<SharedUser> {
        self.users.get(id).map(|e| e.value().clone())
    }

    /// WAL-append + apply + notify for a reservation. Caller holds the listing write lock.
    pub(super) async fn persist_reservation(
        &self,
        ls: &mut ListingState,
        reservation: Reservation,
    ) -> Result<(), EngineError> {
        let event = Event::ReservationCreated {
            reservation: reservation.clone(),
        };
        self.wal_append(&event).await?;
        self.reservation_to_listing
            .insert(reservation.id, reservation.listing_id);
        ls.insert_reservation(reservation);
        self.notify.send(ls.listing.id, &event);
        Ok(())
    }

    /// WAL-append + apply for a favorites event. Caller holds the user write lock.
    pub(super) async fn persist_to_user(&self, user: &mut User, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_user(user, event);
        Ok(())
    }
}

fn event_user_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::FavoriteAdded { user_id, .. } | Event::FavoriteRemoved { user_id, .. } => Some(*user_id),
        Event::UserRegistered { id, .. } => Some(*id),
        Event::ListingCreated { .. } | Event::ReservationCreated { .. } => None,
    }
}
