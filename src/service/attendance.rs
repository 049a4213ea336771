use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::info;

use crate::{
    error::{AppError, AppResult},
    model::attendance::{ActionType, AttendanceEvent, Location, NewAttendanceEvent, WorkingStatus},
    store::{Page, Store},
};

const MAX_GEOLOCATION_LEN: usize = 255;

#[derive(Clone)]
pub struct AttendanceService {
    store: Arc<dyn Store>,
}

impl AttendanceService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Appends a server-stamped clock event. ENTER and EXIT must alternate,
    /// starting with ENTER.
    pub async fn record(
        &self,
        user_id: u64,
        action_type: ActionType,
        location: Location,
        geolocation: Option<String>,
    ) -> AppResult<AttendanceEvent> {
        let geolocation = geolocation
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty());
        if geolocation
            .as_ref()
            .is_some_and(|g| g.chars().count() > MAX_GEOLOCATION_LEN)
        {
            return Err(AppError::validation("Geolocation is too long"));
        }

        let last = self.store.last_event(user_id).await?;
        action_type.check_follows(last.map(|e| e.action_type))?;

        let event = self
            .store
            .append_event(NewAttendanceEvent {
                user_id,
                occurred_at: Utc::now(),
                action_type,
                location,
                geolocation,
            })
            .await?;

        info!(user_id, event_id = event.id, action = %event.action_type, "Attendance recorded");
        Ok(event)
    }

    pub async fn list_own(&self, user_id: u64, page: Page) -> AppResult<Vec<AttendanceEvent>> {
        self.store.list_events_by_user(user_id, page).await
    }

    pub async fn today(&self, user_id: u64) -> AppResult<Vec<AttendanceEvent>> {
        self.on_date(user_id, Utc::now().date_naive()).await
    }

    pub async fn on_date(&self, user_id: u64, date: NaiveDate) -> AppResult<Vec<AttendanceEvent>> {
        self.store.list_events_by_user_on(user_id, date).await
    }

    pub async fn last(&self, user_id: u64) -> AppResult<AttendanceEvent> {
        self.store
            .last_event(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("No attendance events recorded"))
    }

    pub async fn working_status(&self, user_id: u64) -> AppResult<WorkingStatus> {
        let last = self.store.last_event(user_id).await?;
        Ok(WorkingStatus::new(user_id, last))
    }

    pub async fn list_all(&self, page: Page) -> AppResult<Vec<AttendanceEvent>> {
        self.store.list_events(page).await
    }

    pub async fn delete(&self, id: u64) -> AppResult<()> {
        self.store.delete_event(id).await?;
        info!(event_id = id, "Attendance event deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> AttendanceService {
        AttendanceService::new(Arc::new(MemoryStore::new()))
    }

    async fn clock(service: &AttendanceService, action: ActionType) -> AppResult<AttendanceEvent> {
        service.record(1, action, Location::Office, None).await
    }

    #[actix_web::test]
    async fn first_event_must_be_enter() {
        let service = service();
        assert!(matches!(clock(&service, ActionType::Exit).await, Err(AppError::Conflict(_))));
        assert!(clock(&service, ActionType::Enter).await.is_ok());
    }

    #[actix_web::test]
    async fn repeated_actions_conflict() {
        let service = service();
        clock(&service, ActionType::Enter).await.unwrap();
        assert!(matches!(clock(&service, ActionType::Enter).await, Err(AppError::Conflict(_))));
        clock(&service, ActionType::Exit).await.unwrap();
        assert!(matches!(clock(&service, ActionType::Exit).await, Err(AppError::Conflict(_))));
    }

    #[actix_web::test]
    async fn working_status_follows_last_event() {
        let service = service();
        assert!(!service.working_status(1).await.unwrap().is_working);
        assert!(matches!(service.last(1).await, Err(AppError::NotFound(_))));

        clock(&service, ActionType::Enter).await.unwrap();
        assert!(service.working_status(1).await.unwrap().is_working);
        clock(&service, ActionType::Exit).await.unwrap();

        let status = service.working_status(1).await.unwrap();
        assert!(!status.is_working);
        assert_eq!(status.last_event.unwrap().action_type, ActionType::Exit);
        assert_eq!(service.today(1).await.unwrap().len(), 2);
    }

    #[actix_web::test]
    async fn geolocation_is_trimmed_and_bounded() {
        let service = service();
        let event = service
            .record(2, ActionType::Enter, Location::Remote, Some("  ".into()))
            .await
            .unwrap();
        assert_eq!(event.geolocation, None);

        let long = "x".repeat(MAX_GEOLOCATION_LEN + 1);
        assert!(matches!(
            service.record(2, ActionType::Exit, Location::Remote, Some(long)).await,
            Err(AppError::Validation(_))
        ));
    }

    #[actix_web::test]
    async fn delete_missing_event_is_not_found() {
        assert!(matches!(service().delete(77).await, Err(AppError::NotFound(_))));
    }
}
