pub mod approval;
pub mod attendance;
pub mod credential;
pub mod leave_balance;
pub mod leave_request;
pub mod role;
pub mod user;
