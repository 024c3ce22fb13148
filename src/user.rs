//! Code for creating the user table and resolving users from identity provider claims.

use std::fmt::Display;

use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::Error;

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The name of the identity provider the user logged in with, e.g. "google".
    pub provider: String,
    /// The user's ID at the identity provider.
    pub provider_id: String,
    /// The user's display name.
    pub username: String,
    /// The user's email address.
    pub email: String,
}

/// The identity claims returned by an identity provider after a successful log in.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IdentityClaims {
    /// The name of the identity provider, e.g. "google".
    pub provider: String,
    /// The user's ID at the identity provider.
    pub provider_id: String,
    /// The user's display name.
    pub username: String,
    /// The user's email address.
    pub email: String,
}

/// The provider name used for the shared demo account.
pub const DEMO_PROVIDER: &str = "demo";

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS user (
            id INTEGER PRIMARY KEY,
            provider TEXT NOT NULL,
            provider_id TEXT NOT NULL,
            username TEXT NOT NULL,
            email TEXT NOT NULL,
            UNIQUE(provider, provider_id)
        );",
    )?;

    Ok(())
}

/// Find the user matching the provider and provider ID in `claims`, creating
/// the user if they have not logged in before.
///
/// The username and email are refreshed from the claims for returning users.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn resolve_user(claims: &IdentityClaims, connection: &Connection) -> Result<User, Error> {
    let existing = connection
        .prepare(
            "SELECT id, provider, provider_id, username, email FROM user
            WHERE provider = :provider AND provider_id = :provider_id",
        )?
        .query_row(
            &[
                (":provider", &claims.provider),
                (":provider_id", &claims.provider_id),
            ],
            map_user_row,
        )
        .optional()?;

    match existing {
        Some(user) if user.username == claims.username && user.email == claims.email => Ok(user),
        Some(user) => {
            connection.execute(
                "UPDATE user SET username = ?1, email = ?2 WHERE id = ?3",
                (&claims.username, &claims.email, user.id.as_i64()),
            )?;
            tracing::debug!("Refreshed profile for user {}", user.id);

            Ok(User {
                username: claims.username.clone(),
                email: claims.email.clone(),
                ..user
            })
        }
        None => {
            connection.execute(
                "INSERT INTO user (provider, provider_id, username, email) VALUES (?1, ?2, ?3, ?4)",
                (
                    &claims.provider,
                    &claims.provider_id,
                    &claims.username,
                    &claims.email,
                ),
            )?;
            let id = UserID::new(connection.last_insert_rowid());
            tracing::info!("Created user {id} for provider {}", claims.provider);

            Ok(User {
                id,
                provider: claims.provider.clone(),
                provider_id: claims.provider_id.clone(),
                username: claims.username.clone(),
                email: claims.email.clone(),
            })
        }
    }
}

/// Get the shared demo user, creating it on first use.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_demo_user(connection: &Connection) -> Result<User, Error> {
    resolve_user(
        &IdentityClaims {
            provider: DEMO_PROVIDER.to_owned(),
            provider_id: DEMO_PROVIDER.to_owned(),
            username: "Demo".to_owned(),
            email: "demo".to_owned(),
        },
        connection,
    )
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, provider, provider_id, username, email FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(|error| error.into())
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: UserID::new(row.get(0)?),
        provider: row.get(1)?,
        provider_id: row.get(2)?,
        username: row.get(3)?,
        email: row.get(4)?,
    })
}

#[cfg(test)]
mod user_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        user::{IdentityClaims, UserID, create_user_table, get_demo_user, get_user_by_id, resolve_user},
    };

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        create_user_table(&conn).expect("Could not create user table");

        conn
    }

    fn claims(provider_id: &str, username: &str) -> IdentityClaims {
        IdentityClaims {
            provider: "google".to_owned(),
            provider_id: provider_id.to_owned(),
            username: username.to_owned(),
            email: format!("{username}@example.com"),
        }
    }

    #[test]
    fn resolve_creates_user_on_first_log_in() {
        let conn = get_db_connection();

        let user = resolve_user(&claims("g-1", "alice"), &conn).unwrap();

        assert!(user.id.as_i64() > 0);
        assert_eq!(user.provider_id, "g-1");
        assert_eq!(get_user_by_id(user.id, &conn), Ok(user));
    }

    #[test]
    fn resolve_returns_existing_user_and_refreshes_profile() {
        let conn = get_db_connection();
        let first = resolve_user(&claims("g-1", "alice"), &conn).unwrap();

        let second = resolve_user(&claims("g-1", "alicia"), &conn).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.username, "alicia");
        assert_eq!(get_user_by_id(first.id, &conn).unwrap().username, "alicia");
    }

    #[test]
    fn different_provider_ids_are_different_users() {
        let conn = get_db_connection();

        let alice = resolve_user(&claims("g-1", "alice"), &conn).unwrap();
        let bob = resolve_user(&claims("g-2", "bob"), &conn).unwrap();

        assert_ne!(alice.id, bob.id);
    }

    #[test]
    fn demo_user_is_created_once() {
        let conn = get_db_connection();

        let first = get_demo_user(&conn).unwrap();
        let second = get_demo_user(&conn).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn get_user_fails_with_non_existent_id() {
        let conn = get_db_connection();

        assert_eq!(get_user_by_id(UserID::new(42), &conn), Err(Error::NotFound));
    }
}
