//! Hard input limits. Anything past these is rejected with `LimitExceeded`.

/// Longest single stay.
pub const MAX_STAY_NIGHTS: i64 = 365;

/// Widest `list_availability` window.
pub const MAX_QUERY_WINDOW_DAYS: i64 = 3 * 366;

/// Room and guest names.
pub const MAX_NAME_LEN: usize = 256;

pub const MAX_EMAIL_LEN: usize = 320;
