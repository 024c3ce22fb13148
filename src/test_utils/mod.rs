#![allow(missing_docs)]

pub(crate) mod http;

use rusqlite::Connection;

use crate::{
    AppConfig, AppState, User,
    db::initialize,
    user::{IdentityClaims, resolve_user},
};

pub(crate) use http::{auth_cookie_for, get_test_server, log_in_demo_user};

/// An in-memory database with every table created.
pub(crate) fn get_test_connection() -> Connection {
    let conn = Connection::open_in_memory().expect("Could not open in-memory SQLite database");
    initialize(&conn).expect("Could not initialize database");
    conn
}

/// Insert a user identified by `name`.
#[track_caller]
pub(crate) fn create_test_user(connection: &Connection, name: &str) -> User {
    resolve_user(
        &IdentityClaims {
            provider: "test".to_owned(),
            provider_id: name.to_owned(),
            username: name.to_owned(),
            email: format!("{name}@example.com"),
        },
        connection,
    )
    .expect("Could not create test user")
}

/// App state backed by an in-memory database in UTC.
pub(crate) fn get_test_app_state() -> AppState {
    let conn = Connection::open_in_memory().expect("Could not open in-memory SQLite database");

    AppState::new(conn, &AppConfig::new("foobar", "Etc/UTC"))
        .expect("Could not create app state")
}
