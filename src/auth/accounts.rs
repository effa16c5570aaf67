use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRef;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::User;
use crate::state::AppState;

/// Answers whether a token subject may still act.
#[async_trait]
pub trait AccountStatus: Send + Sync {
    /// `false` for removed and deactivated accounts.
    async fn is_active(&self, user_id: Uuid) -> Result<bool, sqlx::Error>;
}

pub struct PgAccounts {
    db: PgPool,
}

impl PgAccounts {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountStatus for PgAccounts {
    async fn is_active(&self, user_id: Uuid) -> Result<bool, sqlx::Error> {
        Ok(User::find_by_id(&self.db, user_id)
            .await?
            .is_some_and(|u| u.is_active))
    }
}

/// Shared handle the `AuthUser` extractor pulls out of the router state.
#[derive(Clone)]
pub struct Accounts(pub Arc<dyn AccountStatus>);

impl FromRef<AppState> for Accounts {
    fn from_ref(state: &AppState) -> Self {
        state.accounts.clone()
    }
}

/// Fixed set of active ids for router tests.
#[cfg(test)]
pub struct FakeAccounts {
    pub active: std::collections::HashSet<Uuid>,
}

#[cfg(test)]
#[async_trait]
impl AccountStatus for FakeAccounts {
    async fn is_active(&self, user_id: Uuid) -> Result<bool, sqlx::Error> {
        Ok(self.active.contains(&user_id))
    }
}
