// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: booking attempts. Labels: outcome (`committed` or an error kind).
pub const SUBMISSIONS_TOTAL: &str = "staybook_submissions_total";

/// Histogram: booking attempt latency in seconds.
pub const SUBMIT_DURATION_SECONDS: &str = "staybook_submit_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: listings held by the store.
pub const LISTINGS_ACTIVE: &str = "staybook_listings_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "staybook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "staybook_wal_flush_batch_size";

/// Counter: compactions run by the background compactor.
pub const WAL_COMPACTIONS_TOTAL: &str = "staybook_wal_compactions_total";
