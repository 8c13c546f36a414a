use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::db::DbError;
use crate::users::repo::UserStore;
use crate::users::repo_types::{User, UserChanges};

/// Process-local [`UserStore`] with the same uniqueness rule as the table.
#[derive(Default)]
pub struct InMemoryUserStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    last_id: u64,
    rows: BTreeMap<u64, User>,
}

impl Inner {
    fn email_taken(&self, email: &str, excluding: Option<u64>) -> Option<u64> {
        self.rows
            .values()
            .find(|u| u.email == email && Some(u.id) != excluding)
            .map(|u| u.id)
    }
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // a poisoned map is still consistent: every mutation is a single insert/remove
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

fn duplicate(email: &str) -> DbError {
    DbError::Duplicate(format!("Duplicate entry '{email}' for key 'users.uq_users_email'"))
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn list(&self, limit: u32, offset: u64) -> Result<Vec<User>, DbError> {
        let inner = self.lock();
        Ok(inner
            .rows
            .values()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<u64, DbError> {
        Ok(self.lock().rows.len() as u64)
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<User>, DbError> {
        Ok(self.lock().rows.get(&id).cloned())
    }

    async fn find_id_by_email(
        &self,
        email: &str,
        excluding: Option<u64>,
    ) -> Result<Option<u64>, DbError> {
        Ok(self.lock().email_taken(email, excluding))
    }

    async fn create(&self, name: &str, email: &str) -> Result<User, DbError> {
        let mut inner = self.lock();
        if inner.email_taken(email, None).is_some() {
            return Err(duplicate(email));
        }
        inner.last_id += 1;
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: inner.last_id,
            name: name.to_string(),
            email: email.to_string(),
            created_at: now,
            updated_at: now,
        };
        inner.rows.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, id: u64, changes: &UserChanges) -> Result<Option<User>, DbError> {
        let mut inner = self.lock();
        if let Some(email) = &changes.email {
            if inner.email_taken(email, Some(id)).is_some() {
                return Err(duplicate(email));
            }
        }
        let Some(user) = inner.rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = &changes.name {
            user.name = name.clone();
        }
        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: u64) -> Result<u64, DbError> {
        Ok(u64::from(self.lock().rows.remove(&id).is_some()))
    }
}
