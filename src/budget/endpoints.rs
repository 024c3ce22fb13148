//! Route handlers for budgets, their expense lines and linking transactions to lines.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{
        FromRef, Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error, UserID,
    app_state::lock_connection,
    budget::{
        Budget, BudgetExpense, BudgetExpenseForm, BudgetForm, add_budget_expense, create_budget,
        delete_budget, get_budget, list_budgets, remove_budget_expense, update_budget,
        update_budget_expense,
    },
    database_id::{BudgetExpenseId, BudgetId, TransactionId, UNASSIGNED_ID},
    reconcile::{link_transactions, recompute_budget},
    transaction::{Transaction, list_budget_transactions},
};

/// The state needed to manage budgets.
#[derive(Debug, Clone)]
pub struct BudgetState {
    /// The database connection for managing budgets.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for BudgetState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A budget with the transactions linked to its expense lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetDetails {
    /// The budget and its expense lines.
    #[serde(flatten)]
    pub budget: Budget,
    /// The transactions linked to any of the budget's lines.
    pub transactions: Vec<Transaction>,
}

/// The request body for linking transactions to an expense line.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkTransactionsRequest {
    /// The transactions to link, `-1` entries are ignored.
    pub transaction_ids: Vec<TransactionId>,
}

/// List the budgets of the logged in user, newest first.
pub async fn get_budgets(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<Budget>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    list_budgets(user_id, &connection).map(Json)
}

/// Create a budget with its expense lines.
pub async fn create_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    payload: Result<Json<BudgetForm>, JsonRejection>,
) -> Result<(StatusCode, Json<Budget>), Error> {
    let Json(form) = payload?;
    let connection = lock_connection(&state.db_connection)?;

    let budget = create_budget(form, user_id, &connection)?;
    tracing::info!("User {user_id} created budget {}", budget.id);

    Ok((StatusCode::CREATED, Json(budget)))
}

/// Get a budget with its expense lines and linked transactions.
pub async fn get_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    budget_id: Result<Path<BudgetId>, PathRejection>,
) -> Result<Json<BudgetDetails>, Error> {
    let Path(budget_id) = budget_id?;
    let connection = lock_connection(&state.db_connection)?;

    let budget = get_budget(budget_id, user_id, &connection)?;
    let transactions = list_budget_transactions(budget_id, &connection)?;

    Ok(Json(BudgetDetails {
        budget,
        transactions,
    }))
}

/// Update a budget, applying the expense lines in the body as a diff.
pub async fn update_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    budget_id: Result<Path<BudgetId>, PathRejection>,
    payload: Result<Json<BudgetForm>, JsonRejection>,
) -> Result<Json<Budget>, Error> {
    let Path(budget_id) = budget_id?;
    let Json(form) = payload?;
    let connection = lock_connection(&state.db_connection)?;

    update_budget(budget_id, user_id, form, &connection).map(Json)
}

/// Delete a budget and its lines, detaching any linked transactions.
pub async fn delete_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    budget_id: Result<Path<BudgetId>, PathRejection>,
) -> Result<StatusCode, Error> {
    let Path(budget_id) = budget_id?;
    let connection = lock_connection(&state.db_connection)?;

    delete_budget(budget_id, user_id, &connection)?;
    tracing::info!("User {user_id} deleted budget {budget_id}");

    Ok(StatusCode::NO_CONTENT)
}

/// Add an expense line to a budget.
pub async fn create_budget_expense_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    budget_id: Result<Path<BudgetId>, PathRejection>,
    payload: Result<Json<BudgetExpenseForm>, JsonRejection>,
) -> Result<(StatusCode, Json<BudgetExpense>), Error> {
    let Path(budget_id) = budget_id?;
    let Json(line) = payload?;
    let connection = lock_connection(&state.db_connection)?;

    let expense = add_budget_expense(budget_id, user_id, line, &connection)?;

    Ok((StatusCode::CREATED, Json(expense)))
}

/// Rename or reallocate an expense line.
pub async fn update_budget_expense_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    ids: Result<Path<(BudgetId, BudgetExpenseId)>, PathRejection>,
    payload: Result<Json<BudgetExpenseForm>, JsonRejection>,
) -> Result<Json<BudgetExpense>, Error> {
    let Path((budget_id, expense_id)) = ids?;
    let Json(line) = payload?;
    let connection = lock_connection(&state.db_connection)?;

    update_budget_expense(budget_id, expense_id, user_id, line, &connection).map(Json)
}

/// Remove an expense line, detaching any linked transactions.
pub async fn delete_budget_expense_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    ids: Result<Path<(BudgetId, BudgetExpenseId)>, PathRejection>,
) -> Result<StatusCode, Error> {
    let Path((budget_id, expense_id)) = ids?;
    let connection = lock_connection(&state.db_connection)?;

    remove_budget_expense(budget_id, expense_id, user_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Link transactions to an expense line and respond with the updated budget.
///
/// An expense line ID of `-1` means "no line" and links nothing.
pub async fn link_transactions_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    ids: Result<Path<(BudgetId, BudgetExpenseId)>, PathRejection>,
    payload: Result<Json<LinkTransactionsRequest>, JsonRejection>,
) -> Result<Json<Budget>, Error> {
    let Path((budget_id, expense_id)) = ids?;
    let Json(request) = payload?;
    let connection = lock_connection(&state.db_connection)?;

    if expense_id != UNASSIGNED_ID {
        link_transactions(
            user_id,
            budget_id,
            expense_id,
            &request.transaction_ids,
            &connection,
        )?;
    }

    get_budget(budget_id, user_id, &connection).map(Json)
}

/// Recompute the accrued amount of every line of a budget.
pub async fn reconcile_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    budget_id: Result<Path<BudgetId>, PathRejection>,
) -> Result<Json<Vec<BudgetExpense>>, Error> {
    let Path(budget_id) = budget_id?;
    let connection = lock_connection(&state.db_connection)?;

    recompute_budget(budget_id, user_id, &connection).map(Json)
}
