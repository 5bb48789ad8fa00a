use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::BookingStatus;
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    NotFound(Ulid),
    InvalidRange {
        check_in: NaiveDate,
        check_out: NaiveDate,
        reason: &'static str,
    },
    /// Every confirmed booking the request collided with.
    Conflict(Vec<Ulid>),
    InvalidState {
        id: Ulid,
        status: BookingStatus,
    },
    StorageTimeout,
    LimitExceeded(&'static str),
    Storage(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::InvalidRange {
                check_in,
                check_out,
                reason,
            } => write!(f, "invalid range [{check_in}, {check_out}): {reason}"),
            EngineError::Conflict(ids) => {
                write!(f, "conflict with booking")?;
                if ids.len() > 1 {
                    write!(f, "s")?;
                }
                for (i, id) in ids.iter().enumerate() {
                    let sep = if i == 0 { ": " } else { ", " };
                    write!(f, "{sep}{id}")?;
                }
                Ok(())
            }
            EngineError::InvalidState { id, status } => {
                write!(f, "booking {id} is {status}")
            }
            EngineError::StorageTimeout => write!(f, "storage timed out"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => EngineError::NotFound(id),
            other => EngineError::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_lists_every_id() {
        let a = Ulid::new();
        let b = Ulid::new();
        assert_eq!(
            EngineError::Conflict(vec![a]).to_string(),
            format!("conflict with booking: {a}")
        );
        assert_eq!(
            EngineError::Conflict(vec![a, b]).to_string(),
            format!("conflict with bookings: {a}, {b}")
        );
    }

    #[test]
    fn store_errors_map_onto_taxonomy() {
        let id = Ulid::new();
        assert_eq!(
            EngineError::from(StoreError::NotFound(id)),
            EngineError::NotFound(id)
        );
        assert!(matches!(
            EngineError::from(StoreError::Io("disk full".into())),
            EngineError::Storage(msg) if msg.contains("disk full")
        ));
    }
}
