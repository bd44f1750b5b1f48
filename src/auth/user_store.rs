//! User Storage
//! Mission: Securely store and manage user accounts with SQLite

use crate::auth::models::User;
use anyhow::{Context, Result};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Credential store with SQLite backend.
///
/// The auth core treats accounts as read-only except at registration and
/// reset-completion; profile management lives elsewhere.
pub struct UserStore {
    db_path: String,
}

impl UserStore {
    /// Create a new user store and initialize database
    pub fn new(db_path: &str) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        Ok(store)
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        // Writers queue instead of erroring when the file is contended.
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    /// Initialize database schema
    fn init_db(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                is_admin INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// Create a new user.
    ///
    /// Returns `Ok(None)` when the email is already registered - decided by
    /// the table's uniqueness constraint, not by a prior read.
    pub fn create_user(&self, email: &str, password: &str, is_admin: bool) -> Result<Option<User>> {
        let password_hash = hash(password, DEFAULT_COST).context("Failed to hash password")?;
        let now = Utc::now().to_rfc3339();

        let user = User {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            password_hash,
            is_admin,
            created_at: now.clone(),
            updated_at: now,
        };

        let conn = self.open()?;
        let result = conn.execute(
            "INSERT INTO users (id, email, password_hash, is_admin, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.id.to_string(),
                user.email,
                user.password_hash,
                user.is_admin,
                user.created_at,
                user.updated_at,
            ],
        );

        match result {
            Ok(_) => {
                info!("✅ Created user: {}", user.email);
                Ok(Some(user))
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Ok(None)
            }
            Err(e) => Err(e).context("Failed to insert user"),
        }
    }

    /// Get user by email (case-insensitive)
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.open()?;

        let mut stmt = conn.prepare(
            "SELECT id, email, password_hash, is_admin, created_at, updated_at
             FROM users WHERE email = ?1",
        )?;

        let user_result = stmt.query_row(params![normalize_email(email)], row_to_user);
        optional(user_result)
    }

    /// Get user by id
    pub fn get_user_by_id(&self, user_id: &Uuid) -> Result<Option<User>> {
        let conn = self.open()?;

        let mut stmt = conn.prepare(
            "SELECT id, email, password_hash, is_admin, created_at, updated_at
             FROM users WHERE id = ?1",
        )?;

        let user_result = stmt.query_row(params![user_id.to_string()], row_to_user);
        optional(user_result)
    }

    /// Verify email and password.
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub fn verify_password(&self, email: &str, password: &str) -> Result<bool> {
        match self.get_user_by_email(email)? {
            Some(user) => {
                let valid =
                    verify(password, &user.password_hash).context("Failed to verify password")?;
                Ok(valid)
            }
            None => Ok(false),
        }
    }

    /// Replace a user's password hash. Returns false when the account is gone.
    pub fn set_password(&self, user_id: &Uuid, new_password: &str) -> Result<bool> {
        let password_hash =
            hash(new_password, DEFAULT_COST).context("Failed to hash password")?;

        let conn = self.open()?;
        let rows_affected = conn.execute(
            "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                password_hash,
                Utc::now().to_rfc3339(),
                user_id.to_string()
            ],
        )?;

        Ok(rows_affected == 1)
    }

    /// List all users (admin surface)
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.open()?;

        let mut stmt = conn.prepare(
            "SELECT id, email, password_hash, is_admin, created_at, updated_at FROM users",
        )?;

        let users = stmt
            .query_map([], row_to_user)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id_str: String = row.get(0)?;
    Ok(User {
        id: Uuid::parse_str(&id_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        is_admin: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn optional(result: rusqlite::Result<User>) -> Result<Option<User>> {
    match result {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (UserStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = UserStore::new(db_path).unwrap();
        (store, temp_file)
    }

    #[test]
    fn test_create_and_retrieve_user() {
        let (store, _temp) = create_test_store();

        let user = store
            .create_user("a@b.com", "Secret1!", false)
            .unwrap()
            .unwrap();
        assert_eq!(user.email, "a@b.com");
        assert!(!user.is_admin);

        let by_email = store.get_user_by_email("a@b.com").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);

        let by_id = store.get_user_by_id(&user.id).unwrap().unwrap();
        assert_eq!(by_id.email, "a@b.com");
    }

    #[test]
    fn test_email_is_normalized() {
        let (store, _temp) = create_test_store();

        store
            .create_user("  Mixed@Case.COM ", "password123", false)
            .unwrap()
            .unwrap();

        let user = store.get_user_by_email("mixed@case.com").unwrap();
        assert!(user.is_some());

        // Same address with different casing hits the uniqueness constraint
        let dup = store.create_user("MIXED@case.com", "password123", false).unwrap();
        assert!(dup.is_none());
    }

    #[test]
    fn test_duplicate_email_rejected_by_constraint() {
        let (store, _temp) = create_test_store();

        assert!(store
            .create_user("a@b.com", "Secret1!", false)
            .unwrap()
            .is_some());
        assert!(store
            .create_user("a@b.com", "Other9?x", false)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_password_verification() {
        let (store, _temp) = create_test_store();
        store.create_user("a@b.com", "Secret1!", false).unwrap();

        assert!(store.verify_password("a@b.com", "Secret1!").unwrap());
        assert!(!store.verify_password("a@b.com", "wrongpassword").unwrap());

        // Unknown email reads the same as a wrong password
        assert!(!store.verify_password("nobody@b.com", "Secret1!").unwrap());
    }

    #[test]
    fn test_set_password() {
        let (store, _temp) = create_test_store();
        let user = store
            .create_user("a@b.com", "Secret1!", false)
            .unwrap()
            .unwrap();

        assert!(store.set_password(&user.id, "NewSecret2!").unwrap());
        assert!(store.verify_password("a@b.com", "NewSecret2!").unwrap());
        assert!(!store.verify_password("a@b.com", "Secret1!").unwrap());

        // Vanished account reports false instead of erroring
        assert!(!store.set_password(&Uuid::new_v4(), "whatever123").unwrap());
    }

    #[test]
    fn test_list_users() {
        let (store, _temp) = create_test_store();
        store.create_user("a@b.com", "Secret1!", false).unwrap();
        store.create_user("admin@b.com", "Secret1!", true).unwrap();

        let users = store.list_users().unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users.iter().filter(|u| u.is_admin).count(), 1);
    }
}
