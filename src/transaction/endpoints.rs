//! Route handlers for single transactions and the transaction type catalogues.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{
        FromRef, Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    AppState, Error, Money, UserID,
    app_state::lock_connection,
    database_id::TransactionId,
    date_range::{DateRange, parse_iso_date},
    reconcile::unlink_transaction,
    timezone::local_today,
    transaction::{
        Interval, RecurringTemplateDetails, RecurringTemplateForm, Schedule, Transaction,
        TransactionType, TransactionUpdate, TypeFilter, create_recurring_template,
        create_transaction, delete_transaction, get_transaction, list_template_occurrences,
        list_transactions_between, list_unassigned_between, update_transaction,
    },
};

/// The state needed to manage transactions.
#[derive(Debug, Clone)]
pub struct TransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The query parameters for listing transactions.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionsQuery {
    /// The month to list, 1 to 12. Defaults to the current month.
    pub month: Option<u8>,
    /// The year to list. Defaults to the current year.
    pub year: Option<i32>,
    /// `true` for income only, `false` for expenses only, absent for both.
    pub income: Option<bool>,
}

/// The query parameters for listing unassigned transactions.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnassignedQuery {
    /// The first date in the range, e.g. "2024-03-01".
    pub start_date: String,
    /// The last date in the range, e.g. "2024-03-31".
    pub end_date: String,
}

/// How a new transaction repeats.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecurringRequest {
    /// The last date an occurrence may fall on, `None` means up to today.
    #[serde(default)]
    pub end_date: Option<Date>,
    /// The cadence of the occurrences.
    pub interval: Interval,
    /// Repeat every `n` days instead of following `interval`.
    #[serde(default)]
    pub days_interval: Option<i64>,
}

/// The request body for creating a transaction.
///
/// When `recurring` is set, `date` is the start date of a recurring
/// transaction and every occurrence up to its end date is created.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateTransactionRequest {
    /// The amount, the sign is normalized from the type.
    pub amount: Money,
    /// What the transaction was for.
    #[serde(default)]
    pub description: String,
    /// The category of the transaction.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// When the transaction happened, or the first occurrence.
    pub date: Date,
    /// How the transaction repeats, if at all.
    #[serde(default)]
    pub recurring: Option<RecurringRequest>,
}

/// The response body for a created transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CreatedTransaction {
    /// A recurring transaction with its generated occurrences.
    Recurring(RecurringTemplateDetails),
    /// A one-off transaction.
    Single(Transaction),
}

/// Resolve the month and year query parameters, defaulting to today's.
pub(crate) fn month_and_year(
    month: Option<u8>,
    year: Option<i32>,
    local_timezone: &str,
) -> Result<(u8, i32), Error> {
    match (month, year) {
        (Some(month), Some(year)) => Ok((month, year)),
        (month, year) => {
            let today = local_today(local_timezone)?;

            Ok((
                month.unwrap_or(u8::from(today.month())),
                year.unwrap_or(today.year()),
            ))
        }
    }
}

/// List the transactions of a month, optionally only income or expenses.
pub async fn get_transactions(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    query: Result<Query<TransactionsQuery>, QueryRejection>,
) -> Result<Json<Vec<Transaction>>, Error> {
    let Query(query) = query?;
    let (month, year) = month_and_year(query.month, query.year, &state.local_timezone)?;
    let range = DateRange::month(month, year)?;
    let connection = lock_connection(&state.db_connection)?;

    list_transactions_between(user_id, range, TypeFilter::from(query.income), &connection).map(Json)
}

/// List the transactions in a date range that are not linked to a budget.
pub async fn get_unassigned_transactions(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    query: Result<Query<UnassignedQuery>, QueryRejection>,
) -> Result<Json<Vec<Transaction>>, Error> {
    let Query(query) = query?;
    let range = DateRange::new(
        parse_iso_date("startDate", &query.start_date)?,
        parse_iso_date("endDate", &query.end_date)?,
    )?;
    let connection = lock_connection(&state.db_connection)?;

    list_unassigned_between(user_id, range, &connection).map(Json)
}

/// Create a one-off transaction, or a recurring transaction and its occurrences.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    payload: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedTransaction>), Error> {
    let Json(request) = payload?;

    let Some(recurring) = request.recurring else {
        let connection = lock_connection(&state.db_connection)?;
        let transaction = create_transaction(
            Transaction::build(
                request.amount,
                request.date,
                &request.description,
                request.transaction_type,
            ),
            user_id,
            &connection,
        )?;

        return Ok((
            StatusCode::CREATED,
            Json(CreatedTransaction::Single(transaction)),
        ));
    };

    let today = local_today(&state.local_timezone)?;
    let form = RecurringTemplateForm {
        amount: request.amount,
        description: request.description,
        transaction_type: request.transaction_type,
        schedule: Schedule {
            start_date: request.date,
            end_date: recurring.end_date,
            interval: recurring.interval,
            days_interval: recurring.days_interval,
        },
    };

    let connection = lock_connection(&state.db_connection)?;
    let template = create_recurring_template(form, user_id, today, &connection)?;
    let transactions = list_template_occurrences(template.id, user_id, &connection)?;
    tracing::info!(
        "User {user_id} created recurring transaction {} with {} occurrences",
        template.id,
        transactions.len()
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatedTransaction::Recurring(RecurringTemplateDetails {
            template,
            transactions,
        })),
    ))
}

/// Get a single transaction.
pub async fn get_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    transaction_id: Result<Path<TransactionId>, PathRejection>,
) -> Result<Json<Transaction>, Error> {
    let Path(transaction_id) = transaction_id?;
    let connection = lock_connection(&state.db_connection)?;

    get_transaction(transaction_id, user_id, &connection).map(Json)
}

/// Edit a one-off transaction.
///
/// Occurrences of recurring transactions are rejected with a conflict naming
/// the recurring transaction to edit instead.
pub async fn update_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    transaction_id: Result<Path<TransactionId>, PathRejection>,
    payload: Result<Json<TransactionUpdate>, JsonRejection>,
) -> Result<StatusCode, Error> {
    let Path(transaction_id) = transaction_id?;
    let Json(update) = payload?;
    let connection = lock_connection(&state.db_connection)?;

    update_transaction(transaction_id, user_id, update, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Delete a one-off transaction.
pub async fn delete_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    transaction_id: Result<Path<TransactionId>, PathRejection>,
) -> Result<StatusCode, Error> {
    let Path(transaction_id) = transaction_id?;
    let connection = lock_connection(&state.db_connection)?;

    delete_transaction(transaction_id, user_id, &connection)?;
    tracing::info!("User {user_id} deleted transaction {transaction_id}");

    Ok(StatusCode::NO_CONTENT)
}

/// Remove a transaction from the budget expense line it is linked to.
pub async fn unlink_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    transaction_id: Result<Path<TransactionId>, PathRejection>,
) -> Result<StatusCode, Error> {
    let Path(transaction_id) = transaction_id?;
    let connection = lock_connection(&state.db_connection)?;

    unlink_transaction(transaction_id, user_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

/// The recurring transaction intervals.
pub async fn get_interval_types() -> Json<[Interval; 4]> {
    Json(Interval::ALL)
}

/// The transaction types that count as income.
pub async fn get_income_types() -> Json<[TransactionType; 6]> {
    Json(TransactionType::INCOME)
}

/// The transaction types that count as expenses.
pub async fn get_expense_types() -> Json<[TransactionType; 13]> {
    Json(TransactionType::EXPENSE)
}
