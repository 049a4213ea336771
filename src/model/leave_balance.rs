use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

/// Standard annual entitlement seeded on first use.
pub const STANDARD_HOLIDAYS: f64 = 22.0;
pub const STANDARD_PERMITS: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, ToSchema)]
pub struct LeaveBalance {
    pub user_id: u64,
    #[schema(example = 22.0)]
    pub accumulated_holidays: f64,
    #[schema(example = 4.0)]
    pub accumulated_permits: f64,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub modified_at: DateTime<Utc>,
}

/// Computes the counters after applying both deltas.
///
/// `current` is `None` when the user has no balance row yet; the deltas then
/// become the opening balance. Either counter going below zero rejects the
/// whole adjustment.
pub fn checked_adjust(
    current: Option<(f64, f64)>,
    holidays_delta: f64,
    permits_delta: f64,
) -> AppResult<(f64, f64)> {
    let (holidays, permits) = current.unwrap_or((0.0, 0.0));
    let next_holidays = holidays + holidays_delta;
    let next_permits = permits + permits_delta;

    if next_holidays < 0.0 {
        return Err(AppError::insufficient(format!(
            "Insufficient holiday balance: cannot subtract {:.1} from {:.1}",
            -holidays_delta, holidays
        )));
    }
    if next_permits < 0.0 {
        return Err(AppError::insufficient(format!(
            "Insufficient permit balance: cannot subtract {:.1} from {:.1}",
            -permits_delta, permits
        )));
    }

    Ok((next_holidays, next_permits))
}

/// Applies a settlement delta. A user without a row holds the standard
/// entitlement, so the first approval deducts from 22 / 4.
pub fn settle_from(current: Option<(f64, f64)>, delta: (f64, f64)) -> AppResult<(f64, f64)> {
    let opening = current.unwrap_or((STANDARD_HOLIDAYS, STANDARD_PERMITS));
    checked_adjust(Some(opening), delta.0, delta.1)
}
