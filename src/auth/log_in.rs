//! Route handlers for logging in, logging out and getting the current user.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use time::Duration;

use crate::{
    AppState, Error, User, UserID,
    app_state::lock_connection,
    auth::cookie::{invalidate_auth_cookie, set_auth_cookie},
    timezone::get_local_offset,
    user::{get_demo_user, get_user_by_id},
};

/// The state needed to log in a user.
#[derive(Debug, Clone)]
pub struct LogInState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
    /// The database connection for looking up users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LogInState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            local_timezone: state.local_timezone.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<LogInState> for Key {
    fn from_ref(state: &LogInState) -> Self {
        state.cookie_key.clone()
    }
}

/// Log in as the shared demo user, creating it on first use.
///
/// Responds with the user and sets the auth cookie.
pub async fn post_demo_log_in(
    State(state): State<LogInState>,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Json<User>), Error> {
    let local_offset = get_local_offset(&state.local_timezone)
        .ok_or_else(|| Error::InvalidTimezoneError(state.local_timezone.clone()))?;

    let user = {
        let connection = lock_connection(&state.db_connection)?;
        get_demo_user(&connection)?
    };

    let jar = set_auth_cookie(jar, user.id, state.cookie_duration, local_offset)?;
    tracing::info!("User {} logged in with the demo account", user.id);

    Ok((jar, Json(user)))
}

/// Log out the current user by invalidating the auth cookie.
pub async fn post_log_out(jar: PrivateCookieJar) -> impl IntoResponse {
    (invalidate_auth_cookie(jar), StatusCode::NO_CONTENT)
}

/// The state needed to look up users.
#[derive(Debug, Clone)]
pub struct UserState {
    /// The database connection for looking up users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for UserState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Get the logged in user.
pub async fn get_current_user(
    State(state): State<UserState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<User>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_user_by_id(user_id, &connection).map(Json)
}

#[cfg(test)]
mod log_in_tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;

    use crate::{
        User,
        auth::COOKIE_TOKEN,
        endpoints,
        test_utils::{self, get_test_app_state},
        user::DEMO_PROVIDER,
    };

    fn get_test_server() -> TestServer {
        test_utils::get_test_server(get_test_app_state())
    }

    #[tokio::test]
    async fn demo_log_in_sets_cookie_and_returns_user() {
        let server = get_test_server();

        let response = server.post(endpoints::DEMO_LOG_IN).await;

        response.assert_status_ok();
        let user: User = response.json();
        assert_eq!(user.provider, DEMO_PROVIDER);
        let token_cookie = response.cookie(COOKIE_TOKEN);
        assert_eq!(token_cookie.http_only(), Some(true));
    }

    #[tokio::test]
    async fn demo_log_in_twice_is_the_same_user() {
        let server = get_test_server();

        let first: User = server.post(endpoints::DEMO_LOG_IN).await.json();
        let second: User = server.post(endpoints::DEMO_LOG_IN).await.json();

        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn current_user_requires_log_in() {
        let server = get_test_server();

        server
            .get(endpoints::CURRENT_USER)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn current_user_after_log_in() {
        let server = get_test_server();
        let response = server.post(endpoints::DEMO_LOG_IN).await;
        let user: User = response.json();

        let response = server
            .get(endpoints::CURRENT_USER)
            .add_cookie(response.cookie(COOKIE_TOKEN))
            .await;

        response.assert_status_ok();
        response.assert_json(&user);
    }

    #[tokio::test]
    async fn log_out_invalidates_cookie() {
        let server = get_test_server();
        let log_in_response = server.post(endpoints::DEMO_LOG_IN).await;

        let response = server
            .post(endpoints::LOG_OUT)
            .add_cookie(log_in_response.cookie(COOKIE_TOKEN))
            .await;

        response.assert_status(StatusCode::NO_CONTENT);
        let invalidated = response.cookie(COOKIE_TOKEN);
        server
            .get(endpoints::CURRENT_USER)
            .add_cookie(invalidated)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
