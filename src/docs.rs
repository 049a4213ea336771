use crate::model::{
    approval::{Approval, ApprovalStatistics, ApprovalStatus, RequestApprovalSummary, RequestStatus},
    attendance::{ActionType, AttendanceEvent, Location, WorkingStatus},
    leave_balance::LeaveBalance,
    leave_request::{LeaveRequest, RequestDraft, RequestType, RequestWithApprovals},
    role::{Role, RolePayload},
    user::UserProfile,
};
use crate::models::{
    ApprovalDecision, AttendanceInput, AuthResponse, ChangePasswordRequest, EntitlementRequest,
    LoginRequest, RegisterRequest, RevokeRequest, StatusUpdate, TokenInfo, UserSummary,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM Leave API",
        version = "1.0.0",
        description = r#"
## Leave & Attendance Management

Backend for employee leave requests, manager approvals, leave balances and
office attendance.

### Key Features
- **Requests**: holiday and permit requests counted in working days
- **Approvals**: accept, reject and revoke decisions; request status is derived from them
- **Balance**: holiday and permit counters, deducted on approval and restored on revocation
- **Attendance**: alternating ENTER / EXIT clock events
- **Roles**: hierarchy levels, lower level means more authority

### Security
Everything under `/api` requires a **JWT Bearer** token obtained from `/auth/login`
or `/auth/register`.

### Response Format
- JSON bodies; errors as `{"error": {"code", "message"}}`
- List endpoints accept `page` and `per_page`
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::register,
        crate::auth::handlers::change_password,
        crate::auth::handlers::profile,
        crate::auth::handlers::validate,
        crate::auth::handlers::logout,

        crate::api::leave_request::create_request,
        crate::api::leave_request::list_own_requests,
        crate::api::leave_request::list_requests,
        crate::api::leave_request::pending_requests,
        crate::api::leave_request::requests_in_range,
        crate::api::leave_request::get_request,
        crate::api::leave_request::get_request_with_approvals,
        crate::api::leave_request::update_request,
        crate::api::leave_request::delete_request,

        crate::api::approval::create_approval,
        crate::api::approval::list_approvals,
        crate::api::approval::approvals_by_status,
        crate::api::approval::approval_statistics,
        crate::api::approval::my_approvals,
        crate::api::approval::approvals_for_request,
        crate::api::approval::request_summary,
        crate::api::approval::get_approval,
        crate::api::approval::update_approval,
        crate::api::approval::revoke_approval,
        crate::api::approval::delete_approval,

        crate::api::attendance::record_event,
        crate::api::attendance::my_events,
        crate::api::attendance::my_events_today,
        crate::api::attendance::my_events_on,
        crate::api::attendance::my_last_event,
        crate::api::attendance::my_working_status,
        crate::api::attendance::list_events,
        crate::api::attendance::delete_event,

        crate::api::role::list_roles,
        crate::api::role::get_role,
        crate::api::role::create_role,
        crate::api::role::update_role,
        crate::api::role::delete_role,

        crate::api::balance::my_balance,
        crate::api::balance::user_balance,
        crate::api::balance::add_entitlement
    ),
    components(
        schemas(
            LoginRequest,
            RegisterRequest,
            ChangePasswordRequest,
            AuthResponse,
            UserSummary,
            UserProfile,
            TokenInfo,
            LeaveRequest,
            RequestDraft,
            RequestType,
            RequestWithApprovals,
            RequestStatus,
            Approval,
            ApprovalStatus,
            ApprovalDecision,
            StatusUpdate,
            RevokeRequest,
            ApprovalStatistics,
            RequestApprovalSummary,
            AttendanceEvent,
            AttendanceInput,
            ActionType,
            Location,
            WorkingStatus,
            Role,
            RolePayload,
            LeaveBalance,
            EntitlementRequest
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login and token APIs"),
        (name = "Requests", description = "Leave request APIs"),
        (name = "Approvals", description = "Approval decision APIs"),
        (name = "Attendance", description = "Clock-in / clock-out APIs"),
        (name = "Roles", description = "Role hierarchy APIs"),
        (name = "Balance", description = "Leave balance APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
