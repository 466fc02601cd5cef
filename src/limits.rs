use chrono::NaiveDate;

pub const MAX_LISTINGS: usize = 100_000;
pub const MAX_USERS: usize = 1_000_000;
pub const MAX_RESERVATIONS_PER_LISTING: usize = 10_000;
pub const MAX_FAVORITES_PER_USER: usize = 1_000;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 10_000;
pub const MAX_IMAGE_SRC_LEN: usize = 2_048;
pub const MAX_NAME_LEN: usize = 200;
pub const MAX_EMAIL_LEN: usize = 320;

pub const MAX_ROOM_COUNT: u32 = 100;
pub const MAX_GUEST_COUNT: u32 = 1_000;
pub const MAX_NIGHTLY_PRICE: i64 = 100_000_000;

/// Default upper bound for a single stay; `Config::max_stay_nights` overrides it.
pub const MAX_STAY_NIGHTS: i64 = 365;

/// Earliest check-in date accepted.
pub const MIN_VALID_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2000, 1, 1) {
    Some(d) => d,
    None => panic!("invalid MIN_VALID_DATE"),
};

/// Latest check-out date accepted.
pub const MAX_VALID_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2200, 12, 31) {
    Some(d) => d,
    None => panic!("invalid MAX_VALID_DATE"),
};

/// Pending appends buffered for the WAL writer task.
pub const WAL_CHANNEL_CAPACITY: usize = 4096;
