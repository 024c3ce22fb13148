//! Database functions for storing and querying transactions.

use rusqlite::{Connection, Row, params};

use crate::{
    Error, UserID,
    database_id::{BudgetExpenseId, BudgetId, TransactionId},
    date_range::DateRange,
    reconcile::recompute_expense,
    transaction::core::{
        BudgetLink, Transaction, TransactionBuilder, TransactionUpdate, TypeFilter,
    },
};

/// The columns read by [map_transaction_row], in order.
pub(crate) const TRANSACTION_COLUMNS: &str = "id, user_id, amount, description, type, date, \
    recurring_template_id, budget_id, budget_expense_id";

/// Create the transaction table in the database.
///
/// The recurring template table must exist before this is called.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                amount TEXT NOT NULL,
                description TEXT NOT NULL,
                type TEXT NOT NULL,
                date TEXT NOT NULL,
                recurring_template_id INTEGER,
                budget_id INTEGER,
                budget_expense_id INTEGER,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(recurring_template_id) REFERENCES recurring_transaction(id) ON DELETE CASCADE,
                FOREIGN KEY(budget_id) REFERENCES budget(id),
                FOREIGN KEY(budget_expense_id) REFERENCES budget_expense(id),
                CHECK ((budget_id IS NULL) = (budget_expense_id IS NULL))
                )",
        (),
    )?;

    // Ensure the sequence starts at 1
    connection.execute(
        "INSERT OR IGNORE INTO sqlite_sequence (name, seq) VALUES ('transaction', 0)",
        (),
    )?;

    connection.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_date ON \"transaction\"(user_id, date);
        CREATE INDEX IF NOT EXISTS idx_transaction_budget ON \"transaction\"(budget_id);
        CREATE INDEX IF NOT EXISTS idx_transaction_budget_expense ON \"transaction\"(budget_expense_id);
        CREATE INDEX IF NOT EXISTS idx_transaction_recurring ON \"transaction\"(recurring_template_id);",
    )?;

    Ok(())
}

/// Map a database row selected with [TRANSACTION_COLUMNS] to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let budget_id: Option<BudgetId> = row.get(7)?;
    let budget_expense_id: Option<BudgetExpenseId> = row.get(8)?;

    let budget = match (budget_id, budget_expense_id) {
        (Some(budget_id), Some(budget_expense_id)) => Some(BudgetLink {
            budget_id,
            budget_expense_id,
        }),
        _ => None,
    };

    Ok(Transaction {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        amount: row.get(2)?,
        description: row.get(3)?,
        transaction_type: row.get(4)?,
        date: row.get(5)?,
        recurring_template_id: row.get(6)?,
        budget,
    })
}

/// Create a new transaction for `user_id` from a builder.
///
/// The amount is stored with the sign implied by the transaction type.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error,
/// e.g. `user_id` or the recurring template ID do not exist.
pub fn create_transaction(
    builder: TransactionBuilder,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let amount = builder.transaction_type.signed_amount(builder.amount);

    let transaction = connection
        .prepare(&format!(
            "INSERT INTO \"transaction\" (user_id, amount, description, type, date, recurring_template_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            params![
                user_id.as_i64(),
                amount,
                builder.description,
                builder.transaction_type,
                builder.date,
                builder.recurring_template_id,
            ],
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Retrieve the transaction `id` owned by `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - [Error::Forbidden] if the transaction belongs to another user,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(
    id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = :id"
        ))?
        .query_one(&[(":id", &id)], map_transaction_row)?;

    if transaction.user_id != user_id {
        return Err(Error::Forbidden);
    }

    Ok(transaction)
}

/// List the transactions owned by `user_id` dated within `range`, ordered by date then ID.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn list_transactions_between(
    user_id: UserID,
    range: DateRange,
    filter: TypeFilter,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let transactions = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
            WHERE user_id = ?1 AND date BETWEEN ?2 AND ?3
            ORDER BY date, id"
        ))?
        .query_map(
            params![user_id.as_i64(), range.start, range.end],
            map_transaction_row,
        )?
        .filter(|result| match result {
            Ok(transaction) => filter.matches(transaction),
            Err(_) => true,
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(transactions)
}

/// List the transactions owned by `user_id` within `range` that are not linked to a budget.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn list_unassigned_between(
    user_id: UserID,
    range: DateRange,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let unassigned = list_transactions_between(user_id, range, TypeFilter::All, connection)?
        .into_iter()
        .filter(|transaction| transaction.budget.is_none())
        .collect();

    Ok(unassigned)
}

/// List the transactions linked to any expense line of `budget_id`, ordered by date then ID.
///
/// Ownership of the budget must be checked by the caller.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn list_budget_transactions(
    budget_id: BudgetId,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let transactions = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
            WHERE budget_id = ?1
            ORDER BY date, id"
        ))?
        .query_map([budget_id], map_transaction_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(transactions)
}

/// List the transactions linked to the expense line `budget_expense_id`.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub(crate) fn list_expense_transactions(
    budget_expense_id: BudgetExpenseId,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let transactions = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE budget_expense_id = ?1"
        ))?
        .query_map([budget_expense_id], map_transaction_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(transactions)
}

/// Update the editable fields of the transaction `id`.
///
/// If the transaction is linked to a budget expense line, the line's accrued
/// amount is recomputed in the same database transaction.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] or [Error::Forbidden] as per [get_transaction],
/// - [Error::RecurringOwnershipViolation] if the transaction was generated
///   from a recurring template,
/// - or [Error::SqlError] there is some other SQL error.
pub fn update_transaction(
    id: TransactionId,
    user_id: UserID,
    update: TransactionUpdate,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    let existing = get_transaction(id, user_id, &sql_transaction)?;
    if let Some(template_id) = existing.recurring_template_id {
        return Err(Error::RecurringOwnershipViolation(template_id));
    }

    let amount = update.transaction_type.signed_amount(update.amount);
    let updated = sql_transaction
        .prepare(&format!(
            "UPDATE \"transaction\" SET amount = ?1, description = ?2, type = ?3, date = ?4
            WHERE id = ?5
            RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            params![
                amount,
                update.description,
                update.transaction_type,
                update.date,
                id
            ],
            map_transaction_row,
        )?;

    if let Some(link) = updated.budget {
        recompute_expense(link.budget_expense_id, &sql_transaction)?;
    }

    sql_transaction.commit()?;

    Ok(updated)
}

/// Delete the transaction `id`.
///
/// If the transaction was linked to a budget expense line, the line's accrued
/// amount is recomputed in the same database transaction.
///
/// # Errors
/// This function will return the same errors as [update_transaction].
pub fn delete_transaction(
    id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    let existing = get_transaction(id, user_id, &sql_transaction)?;
    if let Some(template_id) = existing.recurring_template_id {
        return Err(Error::RecurringOwnershipViolation(template_id));
    }

    sql_transaction.execute("DELETE FROM \"transaction\" WHERE id = ?1", [id])?;

    if let Some(link) = existing.budget {
        recompute_expense(link.budget_expense_id, &sql_transaction)?;
    }

    sql_transaction.commit()?;

    Ok(())
}

/// Point the transaction `id` at a budget expense line.
///
/// This only writes the link, recomputing the accrued amount is up to the caller.
pub(crate) fn set_budget_link(
    id: TransactionId,
    link: BudgetLink,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE \"transaction\" SET budget_id = ?1, budget_expense_id = ?2 WHERE id = ?3",
        params![link.budget_id, link.budget_expense_id, id],
    )?;

    Ok(())
}

/// Remove the budget link from the transaction `id`.
///
/// This only writes the link, recomputing the accrued amount is up to the caller.
pub(crate) fn clear_budget_link(id: TransactionId, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "UPDATE \"transaction\" SET budget_id = NULL, budget_expense_id = NULL WHERE id = ?1",
        [id],
    )?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
