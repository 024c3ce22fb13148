//! Route handlers for the monthly and yearly summaries.

use axum::{
    Extension, Json,
    extract::{Query, State, rejection::QueryRejection},
};
use serde::Deserialize;

use crate::{
    Error, UserID,
    app_state::lock_connection,
    summary::{
        MonthSummary, TypeSummary, YearSummary, month_summary, month_summary_by_type,
        year_summary, year_summary_by_type,
    },
    transaction::{TransactionState, month_and_year},
};

/// The query parameters for a summary, missing values default to today's month and year.
#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    /// The month, 1 to 12.
    pub month: Option<u8>,
    /// The year.
    pub year: Option<i32>,
}

impl SummaryQuery {
    fn resolve(&self, local_timezone: &str) -> Result<(u8, i32), Error> {
        month_and_year(self.month, self.year, local_timezone)
    }
}

/// The income and expense totals of a month.
pub async fn get_month_summary(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    query: Result<Query<SummaryQuery>, QueryRejection>,
) -> Result<Json<MonthSummary>, Error> {
    let Query(query) = query?;
    let (month, year) = query.resolve(&state.local_timezone)?;
    let connection = lock_connection(&state.db_connection)?;

    month_summary(user_id, month, year, &connection).map(Json)
}

/// The per-type totals of a month.
pub async fn get_month_summary_by_type(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    query: Result<Query<SummaryQuery>, QueryRejection>,
) -> Result<Json<TypeSummary>, Error> {
    let Query(query) = query?;
    let (month, year) = query.resolve(&state.local_timezone)?;
    let connection = lock_connection(&state.db_connection)?;

    month_summary_by_type(user_id, month, year, &connection).map(Json)
}

/// The income and expense totals of a year and each of its months.
pub async fn get_year_summary(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    query: Result<Query<SummaryQuery>, QueryRejection>,
) -> Result<Json<YearSummary>, Error> {
    let Query(query) = query?;
    let (_, year) = query.resolve(&state.local_timezone)?;
    let connection = lock_connection(&state.db_connection)?;

    year_summary(user_id, year, &connection).map(Json)
}

/// The per-type totals of a year.
pub async fn get_year_summary_by_type(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    query: Result<Query<SummaryQuery>, QueryRejection>,
) -> Result<Json<TypeSummary>, Error> {
    let Query(query) = query?;
    let (_, year) = query.resolve(&state.local_timezone)?;
    let connection = lock_connection(&state.db_connection)?;

    year_summary_by_type(user_id, year, &connection).map(Json)
}

#[cfg(test)]
mod handler_tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use time::OffsetDateTime;

    use crate::{
        endpoints,
        summary::{MonthSummary, YearSummary},
        test_utils::{get_test_app_state, get_test_server, log_in_demo_user},
    };

    #[tokio::test]
    async fn month_summary_over_http() {
        let server = get_test_server(get_test_app_state());
        let (_, cookie) = log_in_demo_user(&server).await;
        for (amount, transaction_type, date) in [
            ("1000", "salary", "2024-03-05"),
            ("200", "groceries", "2024-03-20"),
            ("50", "dining", "2024-04-01"),
        ] {
            server
                .post(endpoints::TRANSACTIONS)
                .add_cookie(cookie.clone())
                .json(&json!({ "amount": amount, "type": transaction_type, "date": date }))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let march: Value = server
            .get(endpoints::MONTH_SUMMARY)
            .add_query_param("month", 3)
            .add_query_param("year", 2024)
            .add_cookie(cookie.clone())
            .await
            .json();
        let by_type: Value = server
            .get(endpoints::MONTH_SUMMARY_BY_TYPE)
            .add_query_param("month", 4)
            .add_query_param("year", 2024)
            .add_cookie(cookie.clone())
            .await
            .json();
        let year: YearSummary = server
            .get(endpoints::YEAR_SUMMARY)
            .add_query_param("year", 2024)
            .add_cookie(cookie)
            .await
            .json();

        let march: MonthSummary = serde_json::from_value(march).unwrap();
        assert_eq!(march.summary.income.to_string(), "1000.00");
        assert_eq!(march.summary.expense.to_string(), "200.00");
        assert_eq!(march.summary.net.to_string(), "800.00");
        assert_eq!(by_type.as_object().map(|map| map.len()), Some(1));
        assert!(by_type.get("dining").is_some());
        assert_eq!(year.months.len(), 12);
        assert_eq!(year.summary.net.to_string(), "750.00");
    }

    #[tokio::test]
    async fn summary_defaults_to_current_month() {
        let server = get_test_server(get_test_app_state());
        let (_, cookie) = log_in_demo_user(&server).await;

        let summary: MonthSummary = server
            .get(endpoints::MONTH_SUMMARY)
            .add_cookie(cookie)
            .await
            .json();

        let today = OffsetDateTime::now_utc().date();
        assert_eq!(summary.year, today.year());
        assert_eq!(summary.month, u8::from(today.month()));
    }

    #[tokio::test]
    async fn year_summary_by_type_rejects_bad_year() {
        let server = get_test_server(get_test_app_state());
        let (_, cookie) = log_in_demo_user(&server).await;

        server
            .get(endpoints::YEAR_SUMMARY_BY_TYPE)
            .add_query_param("year", "twenty")
            .add_cookie(cookie)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
