use std::sync::Arc;

use tracing::info;

use crate::{
    error::{AppError, AppResult},
    model::role::{Role, RolePayload},
    store::Store,
};

#[derive(Clone)]
pub struct RoleService {
    store: Arc<dyn Store>,
}

fn validate(payload: &RolePayload) -> AppResult<String> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Role name is required"));
    }
    if payload.hierarchy_level < 0 {
        return Err(AppError::validation("Hierarchy level must be zero or greater"));
    }
    Ok(name.to_string())
}

impl RoleService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(&self, payload: RolePayload) -> AppResult<Role> {
        let name = validate(&payload)?;
        if self
            .store
            .find_role_by_level(payload.hierarchy_level)
            .await?
            .is_some()
        {
            return Err(AppError::conflict("Hierarchy level already exists"));
        }

        let role = self.store.insert_role(&name, payload.hierarchy_level).await?;
        info!(role_id = role.id, level = role.hierarchy_level, "Role created");
        Ok(role)
    }

    pub async fn list(&self) -> AppResult<Vec<Role>> {
        self.store.list_roles().await
    }

    pub async fn get(&self, id: u64) -> AppResult<Role> {
        self.store
            .find_role(id)
            .await?
            .ok_or_else(|| AppError::not_found("Role not found"))
    }

    pub async fn update(&self, id: u64, payload: RolePayload) -> AppResult<Role> {
        let name = validate(&payload)?;
        self.get(id).await?;

        if let Some(holder) = self.store.find_role_by_level(payload.hierarchy_level).await? {
            if holder.id != id {
                return Err(AppError::conflict("Hierarchy level already exists"));
            }
        }

        let role = self
            .store
            .update_role(&Role {
                id,
                name,
                hierarchy_level: payload.hierarchy_level,
            })
            .await?;
        info!(role_id = id, "Role updated");
        Ok(role)
    }

    /// Roles still assigned to users cannot be removed.
    pub async fn delete(&self, id: u64) -> AppResult<()> {
        self.get(id).await?;
        if self.store.role_is_assigned(id).await? {
            return Err(AppError::conflict("Role is still assigned to users"));
        }
        self.store.delete_role(id).await?;
        info!(role_id = id, "Role deleted");
        Ok(())
    }
}
