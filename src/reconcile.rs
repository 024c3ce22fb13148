//! Keeps the accrued amount of budget expense lines in step with the
//! transactions linked to them.
//!
//! The accrued amount of a line is always the sum of the absolute amounts of
//! its linked transactions. This module is the only writer of that column and
//! always writes a fresh sum, so running any operation twice has the same
//! effect as running it once.

use rusqlite::Connection;

use crate::{
    Error, Money, UserID,
    budget::{BudgetExpense, get_budget, get_budget_expense},
    database_id::{BudgetExpenseId, BudgetId, TransactionId, UNASSIGNED_ID},
    transaction::{
        BudgetLink, clear_budget_link, get_transaction, list_expense_transactions,
        set_budget_link,
    },
};

/// Recalculate and store the accrued amount of the expense line `expense_id`.
///
/// This runs inside the caller's database transaction, if any.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub(crate) fn recompute_expense(
    expense_id: BudgetExpenseId,
    connection: &Connection,
) -> Result<Money, Error> {
    let accrued: Money = list_expense_transactions(expense_id, connection)?
        .into_iter()
        .map(|transaction| transaction.amount.abs())
        .sum();

    connection.execute(
        "UPDATE budget_expense SET accrued_amount = ?1 WHERE id = ?2",
        (accrued, expense_id),
    )?;

    Ok(accrued)
}

/// Clear the budget link of every transaction linked to `expense_id` and zero its accrued amount.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub(crate) fn detach_expense(
    expense_id: BudgetExpenseId,
    connection: &Connection,
) -> Result<(), Error> {
    let detached = connection.execute(
        "UPDATE \"transaction\" SET budget_id = NULL, budget_expense_id = NULL
        WHERE budget_expense_id = ?1",
        [expense_id],
    )?;

    recompute_expense(expense_id, connection)?;
    tracing::debug!("Detached {detached} transactions from budget expense {expense_id}");

    Ok(())
}

/// Link each of `transaction_ids` to the expense line `expense_id` of `budget_id`.
///
/// IDs equal to `-1` are skipped. A transaction that is already linked to the
/// line is left as is. Either every transaction is linked and the line's
/// accrued amount is recomputed, or nothing changes.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the budget, the line or one of the transactions does not exist,
/// - [Error::Forbidden] if the budget or one of the transactions belongs to another user,
/// - [Error::Conflict] if a transaction is linked to a different expense line,
/// - or [Error::SqlError] there is some other SQL error.
pub fn link_transactions(
    user_id: UserID,
    budget_id: BudgetId,
    expense_id: BudgetExpenseId,
    transaction_ids: &[TransactionId],
    connection: &Connection,
) -> Result<BudgetExpense, Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    get_budget(budget_id, user_id, &sql_transaction)?;
    get_budget_expense(budget_id, expense_id, &sql_transaction)?;

    let link = BudgetLink {
        budget_id,
        budget_expense_id: expense_id,
    };

    for &transaction_id in transaction_ids {
        if transaction_id == UNASSIGNED_ID {
            continue;
        }

        let transaction = get_transaction(transaction_id, user_id, &sql_transaction)?;

        match transaction.budget {
            Some(existing) if existing == link => continue,
            Some(existing) => {
                return Err(Error::Conflict(format!(
                    "transaction {transaction_id} is already linked to budget expense {}",
                    existing.budget_expense_id
                )));
            }
            None => set_budget_link(transaction_id, link, &sql_transaction)?,
        }
    }

    recompute_expense(expense_id, &sql_transaction)?;
    let expense = get_budget_expense(budget_id, expense_id, &sql_transaction)?;

    sql_transaction.commit()?;

    tracing::debug!(
        "Linked {} transactions to budget expense {expense_id}",
        transaction_ids.len()
    );

    Ok(expense)
}

/// Remove the budget link from `transaction_id` and recompute the line it was linked to.
///
/// Unlinking a transaction that is not linked does nothing.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the transaction does not exist,
/// - [Error::Forbidden] if the transaction belongs to another user,
/// - or [Error::SqlError] there is some other SQL error.
pub fn unlink_transaction(
    transaction_id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    let transaction = get_transaction(transaction_id, user_id, &sql_transaction)?;
    let Some(link) = transaction.budget else {
        return Ok(());
    };

    clear_budget_link(transaction_id, &sql_transaction)?;
    recompute_expense(link.budget_expense_id, &sql_transaction)?;

    sql_transaction.commit()?;

    Ok(())
}

/// Recompute the accrued amount of every expense line of `budget_id`.
///
/// # Errors
/// This function will return the same errors as [get_budget].
pub fn recompute_budget(
    budget_id: BudgetId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<BudgetExpense>, Error> {
    let sql_transaction = connection.unchecked_transaction()?;
    let budget = get_budget(budget_id, user_id, &sql_transaction)?;

    for expense in &budget.expenses {
        recompute_expense(expense.id, &sql_transaction)?;
    }

    let expenses = get_budget(budget_id, user_id, &sql_transaction)?.expenses;
    sql_transaction.commit()?;

    Ok(expenses)
}
