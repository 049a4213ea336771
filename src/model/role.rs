use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lower hierarchy level means more authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Role {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Manager")]
    pub name: String,
    #[schema(example = 1)]
    pub hierarchy_level: i32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RolePayload {
    #[schema(example = "Manager")]
    pub name: String,
    #[schema(example = 1)]
    pub hierarchy_level: i32,
}
