//! Route handlers for recurring transactions.

use axum::{
    Extension, Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::{
    Error, UserID,
    app_state::lock_connection,
    database_id::RecurringTemplateId,
    timezone::local_today,
    transaction::{
        RecurringTemplate, RecurringTemplateForm, Transaction, TransactionState,
        delete_recurring_template, get_recurring_template, list_recurring_templates,
        list_template_occurrences, update_recurring_template,
    },
};

/// A recurring transaction with the transactions generated from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringTemplateDetails {
    /// The recurring transaction.
    #[serde(flatten)]
    pub template: RecurringTemplate,
    /// The generated transactions, ordered by date.
    pub transactions: Vec<Transaction>,
}

/// List the recurring transactions of the logged in user.
pub async fn get_recurring_templates(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<RecurringTemplate>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    list_recurring_templates(user_id, &connection).map(Json)
}

/// Get a recurring transaction and its occurrences.
pub async fn get_recurring_template_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    template_id: Result<Path<RecurringTemplateId>, PathRejection>,
) -> Result<Json<RecurringTemplateDetails>, Error> {
    let Path(template_id) = template_id?;
    let connection = lock_connection(&state.db_connection)?;

    let template = get_recurring_template(template_id, user_id, &connection)?;
    let transactions = list_template_occurrences(template_id, user_id, &connection)?;

    Ok(Json(RecurringTemplateDetails {
        template,
        transactions,
    }))
}

/// Update a recurring transaction and every one of its occurrences.
pub async fn update_recurring_template_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    template_id: Result<Path<RecurringTemplateId>, PathRejection>,
    payload: Result<Json<RecurringTemplateForm>, JsonRejection>,
) -> Result<StatusCode, Error> {
    let Path(template_id) = template_id?;
    let Json(form) = payload?;
    let today = local_today(&state.local_timezone)?;
    let connection = lock_connection(&state.db_connection)?;

    update_recurring_template(template_id, user_id, form, today, &connection)?;
    tracing::info!("User {user_id} updated recurring transaction {template_id}");

    Ok(StatusCode::NO_CONTENT)
}

/// Delete a recurring transaction and every one of its occurrences.
pub async fn delete_recurring_template_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    template_id: Result<Path<RecurringTemplateId>, PathRejection>,
) -> Result<StatusCode, Error> {
    let Path(template_id) = template_id?;
    let connection = lock_connection(&state.db_connection)?;

    delete_recurring_template(template_id, user_id, &connection)?;
    tracing::info!("User {user_id} deleted recurring transaction {template_id}");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod recurring_endpoint_tests {
    use axum::http::StatusCode;
    use axum_extra::extract::cookie::Cookie;
    use axum_test::TestServer;
    use serde_json::json;

    use crate::{
        Money,
        endpoints::{self, format_endpoint},
        test_utils::{get_test_app_state, get_test_server, log_in_demo_user},
        transaction::{CreatedTransaction, RecurringTemplate, RecurringTemplateDetails},
    };

    async fn create_rent(server: &TestServer, cookie: &Cookie<'static>) -> RecurringTemplateDetails {
        let response = server
            .post(endpoints::TRANSACTIONS)
            .add_cookie(cookie.clone())
            .json(&json!({
                "amount": "1200",
                "description": "rent",
                "type": "housing",
                "date": "2024-01-15",
                "recurring": { "end_date": "2024-04-15", "interval": "monthly" }
            }))
            .await;
        response.assert_status(StatusCode::CREATED);

        match response.json() {
            CreatedTransaction::Recurring(details) => details,
            CreatedTransaction::Single(transaction) => {
                panic!("expected a recurring transaction, got {transaction:?}")
            }
        }
    }

    #[tokio::test]
    async fn list_and_get_templates() {
        let server = get_test_server(get_test_app_state());
        let (_, cookie) = log_in_demo_user(&server).await;
        let created = create_rent(&server, &cookie).await;

        let listed: Vec<RecurringTemplate> = server
            .get(endpoints::RECURRING_TRANSACTIONS)
            .add_cookie(cookie.clone())
            .await
            .json();
        let fetched: RecurringTemplateDetails = server
            .get(&format_endpoint(
                endpoints::RECURRING_TRANSACTION,
                created.template.id,
            ))
            .add_cookie(cookie)
            .await
            .json();

        assert_eq!(listed, vec![created.template.clone()]);
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn update_propagates_to_every_occurrence() {
        let server = get_test_server(get_test_app_state());
        let (_, cookie) = log_in_demo_user(&server).await;
        let created = create_rent(&server, &cookie).await;
        let path = format_endpoint(endpoints::RECURRING_TRANSACTION, created.template.id);

        server
            .put(&path)
            .add_cookie(cookie.clone())
            .json(&json!({
                "amount": "1300",
                "description": "rent",
                "type": "housing",
                "start_date": "2024-01-15",
                "end_date": "2024-04-15",
                "interval": "monthly"
            }))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let fetched: RecurringTemplateDetails =
            server.get(&path).add_cookie(cookie).await.json();
        assert_eq!(fetched.transactions.len(), 4);
        assert!(
            fetched
                .transactions
                .iter()
                .all(|t| t.amount == Money::from_cents(-130_000))
        );
    }

    #[tokio::test]
    async fn delete_removes_every_occurrence() {
        let server = get_test_server(get_test_app_state());
        let (_, cookie) = log_in_demo_user(&server).await;
        let created = create_rent(&server, &cookie).await;

        server
            .delete(&format_endpoint(
                endpoints::RECURRING_TRANSACTION,
                created.template.id,
            ))
            .add_cookie(cookie.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);

        for transaction in created.transactions {
            server
                .get(&format_endpoint(endpoints::TRANSACTION, transaction.id))
                .add_cookie(cookie.clone())
                .await
                .assert_status(StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn invalid_schedule_is_bad_request() {
        let server = get_test_server(get_test_app_state());
        let (_, cookie) = log_in_demo_user(&server).await;

        server
            .post(endpoints::TRANSACTIONS)
            .add_cookie(cookie)
            .json(&json!({
                "amount": "10",
                "type": "transport",
                "date": "2024-01-15",
                "recurring": { "interval": "daily", "days_interval": 0 }
            }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn huge_day_interval_is_bad_request_and_server_keeps_working() {
        let server = get_test_server(get_test_app_state());
        let (_, cookie) = log_in_demo_user(&server).await;

        server
            .post(endpoints::TRANSACTIONS)
            .add_cookie(cookie.clone())
            .json(&json!({
                "amount": "10",
                "type": "transport",
                "date": "2024-01-15",
                "recurring": {
                    "end_date": "2024-02-15",
                    "interval": "daily",
                    "days_interval": 200_000_000_000_000i64
                }
            }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .get(endpoints::RECURRING_TRANSACTIONS)
            .add_cookie(cookie)
            .await
            .assert_status_ok();
    }
}
