use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::model::approval::{Approval, RequestStatus};

/// Longest HOLIDAY request, in working days.
pub const MAX_HOLIDAY_DAYS: i64 = 30;
/// Longest PERMIT request, in working days.
pub const MAX_PERMIT_DAYS: i64 = 5;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestType {
    Holiday,
    Permit,
}

impl RequestType {
    pub fn max_working_days(&self) -> i64 {
        match self {
            RequestType::Holiday => MAX_HOLIDAY_DAYS,
            RequestType::Permit => MAX_PERMIT_DAYS,
        }
    }

    /// Signed (holidays, permits) deltas moving `days` out of the matching counter.
    pub fn deduction(&self, days: f64) -> (f64, f64) {
        match self {
            RequestType::Holiday => (-days, 0.0),
            RequestType::Permit => (0.0, -days),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LeaveRequest {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub user_id: u64,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    pub request_type: RequestType,
    pub notes: Option<String>,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl LeaveRequest {
    /// Inclusive interval overlap.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && self.end_date >= start
    }

    pub fn working_days(&self) -> i64 {
        working_days(self.start_date, self.end_date)
    }
}

#[derive(Debug, Clone)]
pub struct NewLeaveRequest {
    pub user_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub request_type: RequestType,
    pub notes: Option<String>,
}

/// Client-supplied fields for creating or editing a request. The type stays a
/// raw string so it is validated in order with the date checks.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RequestDraft {
    #[schema(example = "2026-11-02", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-11-04", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "HOLIDAY")]
    pub request_type: String,
    pub notes: Option<String>,
}

/// A request with its decisions and derived status.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RequestWithApprovals {
    pub request: LeaveRequest,
    pub status: RequestStatus,
    pub approvals: Vec<Approval>,
}

/// Counts Monday..Friday dates in `[start, end]`.
pub fn working_days(start: NaiveDate, end: NaiveDate) -> i64 {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .count() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn working_days_skip_weekends() {
        // 2026-10-19 is a Monday
        assert_eq!(working_days(date(2026, 10, 19), date(2026, 10, 23)), 5);
        assert_eq!(working_days(date(2026, 10, 19), date(2026, 10, 25)), 5);
        assert_eq!(working_days(date(2026, 10, 19), date(2026, 10, 26)), 6);
        assert_eq!(working_days(date(2026, 10, 24), date(2026, 10, 25)), 0);
        assert_eq!(working_days(date(2026, 10, 21), date(2026, 10, 21)), 1);
    }

    #[test]
    fn empty_when_reversed() {
        assert_eq!(working_days(date(2026, 10, 23), date(2026, 10, 19)), 0);
    }

    #[test]
    fn request_type_parses_wire_names() {
        assert_eq!("HOLIDAY".parse::<RequestType>().unwrap(), RequestType::Holiday);
        assert_eq!("PERMIT".parse::<RequestType>().unwrap(), RequestType::Permit);
        assert!("SICK".parse::<RequestType>().is_err());
        assert_eq!(RequestType::Permit.as_ref(), "PERMIT");
    }

    #[test]
    fn overlap_is_inclusive() {
        let req = LeaveRequest {
            id: 1,
            user_id: 1,
            start_date: date(2026, 10, 19),
            end_date: date(2026, 10, 21),
            request_type: RequestType::Holiday,
            notes: None,
            created_at: Utc::now(),
        };
        assert!(req.overlaps(date(2026, 10, 21), date(2026, 10, 23)));
        assert!(req.overlaps(date(2026, 10, 15), date(2026, 10, 19)));
        assert!(!req.overlaps(date(2026, 10, 22), date(2026, 10, 23)));
        assert!(!req.overlaps(date(2026, 10, 12), date(2026, 10, 18)));
    }
}
