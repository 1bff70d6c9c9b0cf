//! Provisioning race integration tests.
//!
//! A wrapping store injects a competing writer or a storage failure at the
//! exact point between the lookup and the insert, so the race outcomes are
//! deterministic.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use libsql::Value;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use clinic_db::error::DatabaseError;
use clinic_db::{LocalStore, ProfileDefaults, ProfileProvisioner, SqlStore, StoredRow};

/// What the wrapper does on the first profile insert it sees.
#[derive(Clone, Copy)]
enum InsertHook {
    /// Another writer inserts the same user's row first.
    CompetingWriter,
    /// The insert reports a unique violation but nothing was written.
    PhantomViolation,
    /// The insert fails with a non-race constraint error.
    ConstraintFailure,
}

struct HookedStore {
    inner: LocalStore,
    hook: InsertHook,
    fired: AtomicBool,
}

impl HookedStore {
    async fn new(hook: InsertHook) -> Self {
        Self {
            inner: LocalStore::open_local(":memory:").await.unwrap(),
            hook,
            fired: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SqlStore for HookedStore {
    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, DatabaseError> {
        let is_profile_insert = sql.starts_with("INSERT INTO user_profiles");
        if is_profile_insert && !self.fired.swap(true, Ordering::SeqCst) {
            match self.hook {
                InsertHook::CompetingWriter => {
                    let user_id = params[1].clone();
                    self.inner
                        .execute(
                            "INSERT INTO user_profiles (id, user_id, role) VALUES ('prf-winner01', ?1, 'staff')",
                            vec![user_id],
                        )
                        .await?;
                }
                InsertHook::PhantomViolation => {
                    return Err(DatabaseError::UniqueViolation(
                        "UNIQUE constraint failed: user_profiles.user_id".into(),
                    ));
                }
                InsertHook::ConstraintFailure => {
                    return Err(DatabaseError::Constraint(
                        "CHECK constraint failed: role".into(),
                    ));
                }
            }
        }
        self.inner.execute(sql, params).await
    }

    async fn query(
        &self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Vec<StoredRow>, DatabaseError> {
        self.inner.query(sql, params).await
    }

    async fn generate_id(&self, prefix: &str) -> Result<String, DatabaseError> {
        self.inner.generate_id(prefix).await
    }
}

async fn profile_count(store: &impl SqlStore, user_id: &str) -> i64 {
    let row = store
        .get_optional(
            "SELECT COUNT(*) FROM user_profiles WHERE user_id = ?1",
            vec![Value::from(user_id.to_string())],
        )
        .await
        .unwrap()
        .unwrap();
    row.integer(0).unwrap()
}

#[tokio::test]
async fn losing_the_race_returns_the_winners_row() {
    let store = Arc::new(HookedStore::new(InsertHook::CompetingWriter).await);
    let provisioner = ProfileProvisioner::new(Arc::clone(&store));

    let profile = provisioner
        .ensure("u1", &ProfileDefaults::default())
        .await
        .unwrap();

    assert_eq!(profile.id, "prf-winner01");
    assert_eq!(profile.user_id, "u1");
    assert_eq!(profile_count(store.as_ref(), "u1").await, 1);
}

#[tokio::test]
async fn unique_violation_without_a_row_is_fatal() {
    let store = Arc::new(HookedStore::new(InsertHook::PhantomViolation).await);
    let provisioner = ProfileProvisioner::new(Arc::clone(&store));

    let err = provisioner
        .ensure("u1", &ProfileDefaults::default())
        .await
        .unwrap_err();

    assert!(matches!(err, DatabaseError::InvalidState(_)), "got {err:?}");
    assert_eq!(profile_count(store.as_ref(), "u1").await, 0);
}

#[tokio::test]
async fn other_insert_failures_propagate() {
    let store = Arc::new(HookedStore::new(InsertHook::ConstraintFailure).await);
    let provisioner = ProfileProvisioner::new(store);

    let err = provisioner
        .ensure("u1", &ProfileDefaults::default())
        .await
        .unwrap_err();

    assert!(matches!(err, DatabaseError::Constraint(_)), "got {err:?}");
}

#[tokio::test]
async fn concurrent_callers_converge_on_one_row() {
    let store = Arc::new(LocalStore::open_local(":memory:").await.unwrap());
    let provisioner = ProfileProvisioner::new(Arc::clone(&store));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let provisioner = provisioner.clone();
            tokio::spawn(async move {
                provisioner
                    .ensure("u1", &ProfileDefaults::default())
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap().id);
    }

    ids.dedup();
    assert_eq!(ids.len(), 1, "all callers must see the same row: {ids:?}");
    assert_eq!(profile_count(store.as_ref(), "u1").await, 1);
}

#[tokio::test]
async fn profiles_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clinic.db");
    let path = path.to_str().unwrap();

    let created = {
        let store = Arc::new(LocalStore::open_local(path).await.unwrap());
        ProfileProvisioner::new(store)
            .ensure("u1", &ProfileDefaults::default())
            .await
            .unwrap()
    };

    let store = Arc::new(LocalStore::open_local(path).await.unwrap());
    let found = ProfileProvisioner::new(store)
        .ensure("u1", &ProfileDefaults::default())
        .await
        .unwrap();
    assert_eq!(found.id, created.id);
}
