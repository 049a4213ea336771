pub mod auth;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod password;

/// Manager-or-above gate, checked as "level <= MANAGER_LEVEL".
pub const MANAGER_LEVEL: i32 = 1;
/// Role administration gate, checked as "level >= ROLE_ADMIN_LEVEL".
pub const ROLE_ADMIN_LEVEL: i32 = 2;
