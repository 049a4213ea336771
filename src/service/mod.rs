//! Business engines. Each service holds the shared store handle and
//! enforces its rules before touching persistence.

use std::sync::Arc;

use crate::{
    auth::{jwt::TokenIssuer, password::CredentialHasher},
    store::Store,
};

pub mod approvals;
pub mod attendance;
pub mod credentials;
pub mod ledger;
pub mod requests;
pub mod roles;

use approvals::ApprovalService;
use attendance::AttendanceService;
use credentials::CredentialService;
use ledger::LedgerService;
use requests::RequestService;
use roles::RoleService;

/// Everything handlers need, shared through `web::Data`.
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenIssuer>,
    pub credentials: CredentialService,
    pub ledger: LedgerService,
    pub requests: RequestService,
    pub approvals: ApprovalService,
    pub attendance: AttendanceService,
    pub roles: RoleService,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, tokens: TokenIssuer, hasher: CredentialHasher) -> Self {
        let ledger = LedgerService::new(store.clone());

        AppState {
            tokens: Arc::new(tokens),
            credentials: CredentialService::new(store.clone(), hasher),
            requests: RequestService::new(store.clone(), ledger.clone()),
            approvals: ApprovalService::new(store.clone()),
            attendance: AttendanceService::new(store.clone()),
            roles: RoleService::new(store),
            ledger,
        }
    }
}
