use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Enter,
    Exit,
}

impl ActionType {
    /// Events must alternate, starting with ENTER.
    pub fn check_follows(self, last: Option<ActionType>) -> AppResult<()> {
        match (last, self) {
            (None, ActionType::Exit) => Err(AppError::conflict("First event must be ENTER")),
            (Some(ActionType::Enter), ActionType::Enter) => Err(AppError::conflict(
                "Cannot enter twice in a row, exit first",
            )),
            (Some(ActionType::Exit), ActionType::Exit) => Err(AppError::conflict(
                "Cannot exit twice in a row, enter first",
            )),
            _ => Ok(()),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Location {
    Office,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AttendanceEvent {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "2026-01-01T08:30:00Z", format = "date-time", value_type = String)]
    pub occurred_at: DateTime<Utc>,
    pub action_type: ActionType,
    pub location: Location,
    pub geolocation: Option<String>,
}

/// Server-stamped event about to be appended.
#[derive(Debug, Clone)]
pub struct NewAttendanceEvent {
    pub user_id: u64,
    pub occurred_at: DateTime<Utc>,
    pub action_type: ActionType,
    pub location: Location,
    pub geolocation: Option<String>,
}

/// A user is working when their latest event is ENTER.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WorkingStatus {
    pub user_id: u64,
    pub is_working: bool,
    pub last_event: Option<AttendanceEvent>,
}

impl WorkingStatus {
    pub fn new(user_id: u64, last_event: Option<AttendanceEvent>) -> Self {
        WorkingStatus {
            user_id,
            is_working: matches!(&last_event, Some(e) if e.action_type == ActionType::Enter),
            last_event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_alternates_from_enter() {
        assert!(ActionType::Enter.check_follows(None).is_ok());
        assert!(ActionType::Exit.check_follows(Some(ActionType::Enter)).is_ok());
        assert!(ActionType::Enter.check_follows(Some(ActionType::Exit)).is_ok());
    }

    #[test]
    fn repeated_or_leading_exit_conflicts() {
        assert!(matches!(ActionType::Exit.check_follows(None), Err(AppError::Conflict(_))));
        assert!(matches!(
            ActionType::Enter.check_follows(Some(ActionType::Enter)),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            ActionType::Exit.check_follows(Some(ActionType::Exit)),
            Err(AppError::Conflict(_))
        ));
    }
}
