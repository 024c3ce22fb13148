//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/budgets/{budget_id}', use [format_endpoint].

/// The route for logging in as the shared demo user.
pub const DEMO_LOG_IN: &str = "/api/auth/demo";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/api/auth/log_out";
/// The route for getting the logged in user.
pub const CURRENT_USER: &str = "/api/users/me";

/// The route to list and create transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route to list transactions that are not linked to a budget.
pub const UNASSIGNED_TRANSACTIONS: &str = "/api/transactions/unassigned";
/// The route to access a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route to unlink a transaction from its budget expense.
pub const TRANSACTION_BUDGET: &str = "/api/transactions/{transaction_id}/budget";
/// The route listing the recurring transaction intervals.
pub const INTERVAL_TYPES: &str = "/api/transactions/types/intervals";
/// The route listing the income transaction types.
pub const INCOME_TYPES: &str = "/api/transactions/types/income";
/// The route listing the expense transaction types.
pub const EXPENSE_TYPES: &str = "/api/transactions/types/expense";
/// The route for the income and expense totals of a month.
pub const MONTH_SUMMARY: &str = "/api/transactions/summary/month";
/// The route for the per-type totals of a month.
pub const MONTH_SUMMARY_BY_TYPE: &str = "/api/transactions/summary/month/type";
/// The route for the income and expense totals of a year.
pub const YEAR_SUMMARY: &str = "/api/transactions/summary/year";
/// The route for the per-type totals of a year.
pub const YEAR_SUMMARY_BY_TYPE: &str = "/api/transactions/summary/year/type";

/// The route to list recurring transactions.
pub const RECURRING_TRANSACTIONS: &str = "/api/recurring";
/// The route to access a single recurring transaction.
pub const RECURRING_TRANSACTION: &str = "/api/recurring/{template_id}";

/// The route to list and create budgets.
pub const BUDGETS: &str = "/api/budgets";
/// The route to access a single budget.
pub const BUDGET: &str = "/api/budgets/{budget_id}";
/// The route to add an expense line to a budget.
pub const BUDGET_EXPENSES: &str = "/api/budgets/{budget_id}/expenses";
/// The route to access a single budget expense line.
pub const BUDGET_EXPENSE: &str = "/api/budgets/{budget_id}/expenses/{expense_id}";
/// The route to link transactions to a budget expense line.
pub const BUDGET_EXPENSE_TRANSACTIONS: &str =
    "/api/budgets/{budget_id}/expenses/{expense_id}/transactions";
/// The route to recompute the accrued amounts of a budget's expense lines.
pub const BUDGET_RECONCILE: &str = "/api/budgets/{budget_id}/reconcile";

/// Replace the first parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/users/{user_id}', '{user_id}' is the parameter.
/// Call this once per parameter for paths with several parameters.
///
/// This function assumes that an endpoint path only contains ASCII characters.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let mut param_start = None;
    let mut param_end = None;

    for (i, c) in endpoint_path.chars().enumerate() {
        if c == '{' {
            param_start = Some(i);
        } else if param_start.is_some() && c == '}' {
            param_end = Some(i + 1);
            break;
        }
    }

    let param_start = match param_start {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = param_end.unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
