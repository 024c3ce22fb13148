use axum::{http::header::SET_COOKIE, response::IntoResponse};
use axum_extra::extract::{PrivateCookieJar, cookie::Cookie};
use axum_test::TestServer;
use time::UtcOffset;

use crate::{
    AppState, User, UserID,
    auth::{COOKIE_TOKEN, set_auth_cookie},
    build_router, endpoints,
};

/// A test server running the full router over `state`.
pub(crate) fn get_test_server(state: AppState) -> TestServer {
    TestServer::try_new(build_router(state)).expect("Could not create test server.")
}

/// Log in as the demo user, returning the user and their auth cookie.
pub(crate) async fn log_in_demo_user(server: &TestServer) -> (User, Cookie<'static>) {
    let response = server.post(endpoints::DEMO_LOG_IN).await;
    response.assert_status_ok();

    (response.json(), response.cookie(COOKIE_TOKEN))
}

/// Mint an encrypted auth cookie for `user_id` with the key in `state`.
pub(crate) fn auth_cookie_for(state: &AppState, user_id: UserID) -> Cookie<'static> {
    let jar = set_auth_cookie(
        PrivateCookieJar::new(state.cookie_key.clone()),
        user_id,
        state.cookie_duration,
        UtcOffset::UTC,
    )
    .expect("Could not set auth cookie");
    let response = jar.into_response();
    let header = response
        .headers()
        .get(SET_COOKIE)
        .expect("Missing set-cookie header")
        .to_str()
        .expect("Set-cookie header is not a string");

    let cookie = Cookie::parse(header.to_owned()).expect("Could not parse auth cookie");
    assert_eq!(cookie.name(), COOKIE_TOKEN);
    cookie
}
