//! Profile repository.
//!
//! Idempotent create-if-absent provisioning of the per-user profile row.
//! Safe when several callers (a second window, a duplicate effect) race on
//! the same user's first login: the `user_id` UNIQUE constraint picks one
//! winner and every loser re-reads the winner's row.

use std::sync::Arc;

use chrono::Utc;
use libsql::Value;

use clinic_core::entities::Profile;
use clinic_core::ids::PREFIX_PROFILE;

use crate::error::DatabaseError;
use crate::helpers::{get_opt_string, parse_datetime};
use crate::store::{SqlStore, StoredRow};

const SELECT_BY_USER: &str = "SELECT id, user_id, display_name, role, created_at \
     FROM user_profiles WHERE user_id = ?1";

const INSERT_PROFILE: &str = "INSERT INTO user_profiles (id, user_id, display_name, role, created_at) \
     VALUES (?1, ?2, ?3, ?4, ?5)";

/// Column values for a freshly provisioned profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDefaults {
    pub display_name: Option<String>,
    pub role: String,
}

impl Default for ProfileDefaults {
    fn default() -> Self {
        Self {
            display_name: None,
            role: "staff".into(),
        }
    }
}

/// Provisions one profile row per authenticated user.
pub struct ProfileProvisioner<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for ProfileProvisioner<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: SqlStore + ?Sized> ProfileProvisioner<S> {
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Look up the profile for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or the row cannot be parsed.
    pub async fn find(&self, user_id: &str) -> Result<Option<Profile>, DatabaseError> {
        self.store
            .get_optional(SELECT_BY_USER, vec![Value::from(user_id.to_string())])
            .await?
            .map(|row| row_to_profile(&row))
            .transpose()
    }

    /// Return the profile for `user_id`, creating it with `defaults` if absent.
    ///
    /// All concurrent callers for the same user observe the same row id.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` for any failure other than losing the insert
    /// race, and `DatabaseError::InvalidState` if the row is still missing
    /// after a unique violation.
    pub async fn ensure(
        &self,
        user_id: &str,
        defaults: &ProfileDefaults,
    ) -> Result<Profile, DatabaseError> {
        if let Some(existing) = self.find(user_id).await? {
            tracing::debug!(user_id, profile_id = %existing.id, "profile already provisioned");
            return Ok(existing);
        }

        let id = self.store.generate_id(PREFIX_PROFILE).await?;
        let now = Utc::now();
        let insert = self
            .store
            .execute(
                INSERT_PROFILE,
                vec![
                    Value::from(id.clone()),
                    Value::from(user_id.to_string()),
                    defaults
                        .display_name
                        .clone()
                        .map_or(Value::Null, Value::from),
                    Value::from(defaults.role.clone()),
                    Value::from(now.to_rfc3339()),
                ],
            )
            .await;

        match insert {
            Ok(_) => {
                tracing::info!(user_id, profile_id = %id, "profile provisioned");
                Ok(Profile {
                    id,
                    user_id: user_id.to_string(),
                    display_name: defaults.display_name.clone(),
                    role: defaults.role.clone(),
                    created_at: now,
                })
            }
            Err(error) if error.is_unique_violation() => {
                tracing::debug!(user_id, %error, "lost provisioning race; re-reading winner");
                self.find(user_id).await?.ok_or_else(|| {
                    DatabaseError::InvalidState(format!(
                        "profile for {user_id} missing after unique violation"
                    ))
                })
            }
            Err(error) => {
                tracing::warn!(user_id, %error, "profile provisioning failed");
                Err(error)
            }
        }
    }
}

fn row_to_profile(row: &StoredRow) -> Result<Profile, DatabaseError> {
    Ok(Profile {
        id: row.text(0)?,
        user_id: row.text(1)?,
        display_name: get_opt_string(row, 2)?,
        role: row.text(3)?,
        created_at: parse_datetime(&row.text(4)?)?,
    })
}
