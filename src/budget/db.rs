//! Database functions for storing budgets and their expense lines.

use std::collections::BTreeMap;

use rusqlite::{Connection, Row, params};

use crate::{
    Error, Money, UserID,
    budget::core::{Budget, BudgetExpense, BudgetExpenseForm, BudgetForm},
    database_id::{BudgetExpenseId, BudgetId},
    reconcile::detach_expense,
};

/// Create the budget table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budget (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                amount TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_budget_user_start ON budget(user_id, start_date);",
        (),
    )?;

    Ok(())
}

/// Create the budget expense table in the database.
///
/// The budget table must exist before this is called.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_budget_expense_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budget_expense (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                budget_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                allocated_amount TEXT NOT NULL,
                accrued_amount TEXT NOT NULL DEFAULT '0.00',
                FOREIGN KEY(budget_id) REFERENCES budget(id)
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_budget_expense_budget ON budget_expense(budget_id);",
        (),
    )?;

    Ok(())
}

const BUDGET_COLUMNS: &str = "id, user_id, name, description, amount, start_date, end_date";
const EXPENSE_COLUMNS: &str = "id, budget_id, name, allocated_amount, accrued_amount";

fn map_budget_row(row: &Row) -> Result<Budget, rusqlite::Error> {
    Ok(Budget {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        name: row.get(2)?,
        description: row.get(3)?,
        amount: row.get(4)?,
        start_date: row.get(5)?,
        end_date: row.get(6)?,
        expenses: Vec::new(),
    })
}

/// Map a database row to a BudgetExpense.
fn map_budget_expense_row(row: &Row) -> Result<BudgetExpense, rusqlite::Error> {
    Ok(BudgetExpense {
        id: row.get(0)?,
        budget_id: row.get(1)?,
        name: row.get(2)?,
        allocated_amount: row.get(3)?,
        accrued_amount: row.get(4)?,
    })
}

/// Create a budget and its expense lines as one atomic unit.
///
/// IDs on the expense line forms are ignored, every line is new.
///
/// # Errors
/// This function will return a:
/// - [Error::Validation] if the budget or one of its lines is invalid,
/// - or [Error::SqlError] if there is an SQL error, in which case nothing is stored.
pub fn create_budget(
    form: BudgetForm,
    user_id: UserID,
    connection: &Connection,
) -> Result<Budget, Error> {
    form.validate()?;

    let sql_transaction = connection.unchecked_transaction()?;

    let budget_id: BudgetId = sql_transaction.query_row(
        "INSERT INTO budget (user_id, name, description, amount, start_date, end_date)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        RETURNING id",
        params![
            user_id.as_i64(),
            form.name.trim(),
            form.description,
            form.amount,
            form.start_date,
            form.end_date,
        ],
        |row| row.get(0),
    )?;

    for line in &form.expenses {
        insert_expense(budget_id, line, &sql_transaction)?;
    }

    let budget = query_budget(budget_id, &sql_transaction)?;
    sql_transaction.commit()?;

    tracing::debug!(
        "Created budget {budget_id} with {} expense lines",
        budget.expenses.len()
    );

    Ok(budget)
}

fn insert_expense(
    budget_id: BudgetId,
    line: &BudgetExpenseForm,
    connection: &Connection,
) -> Result<BudgetExpense, Error> {
    connection
        .prepare(&format!(
            "INSERT INTO budget_expense (budget_id, name, allocated_amount, accrued_amount)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING {EXPENSE_COLUMNS}"
        ))?
        .query_row(
            params![budget_id, line.name.trim(), line.allocated_amount, Money::ZERO],
            map_budget_expense_row,
        )
        .map_err(Error::from)
}

/// Get the budget `id` with its expense lines, without checking the owner.
fn query_budget(id: BudgetId, connection: &Connection) -> Result<Budget, Error> {
    let mut budget = connection
        .prepare(&format!("SELECT {BUDGET_COLUMNS} FROM budget WHERE id = :id"))?
        .query_one(&[(":id", &id)], map_budget_row)?;

    budget.expenses = list_budget_expenses(id, connection)?;

    Ok(budget)
}

/// List the expense lines of `budget_id`, ordered by ID.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
fn list_budget_expenses(
    budget_id: BudgetId,
    connection: &Connection,
) -> Result<Vec<BudgetExpense>, Error> {
    connection
        .prepare(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM budget_expense WHERE budget_id = ?1 ORDER BY id"
        ))?
        .query_map([budget_id], map_budget_expense_row)?
        .map(|result| result.map_err(Error::from))
        .collect()
}

/// Retrieve the budget `id` owned by `user_id`, including its expense lines.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a budget,
/// - [Error::Forbidden] if the budget belongs to another user,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_budget(id: BudgetId, user_id: UserID, connection: &Connection) -> Result<Budget, Error> {
    let budget = query_budget(id, connection)?;

    if budget.user_id != user_id {
        return Err(Error::Forbidden);
    }

    Ok(budget)
}

/// Retrieve the expense line `expense_id` of the budget `budget_id`.
///
/// The budget's owner must be checked by the caller.
///
/// # Errors
/// Returns an [Error::NotFound] if the line does not exist or belongs to a different budget.
pub fn get_budget_expense(
    budget_id: BudgetId,
    expense_id: BudgetExpenseId,
    connection: &Connection,
) -> Result<BudgetExpense, Error> {
    let expense = connection
        .prepare(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM budget_expense WHERE id = :id"
        ))?
        .query_one(&[(":id", &expense_id)], map_budget_expense_row)?;

    if expense.budget_id != budget_id {
        return Err(Error::NotFound);
    }

    Ok(expense)
}

/// List the budgets owned by `user_id` with their lines, newest start date first.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn list_budgets(user_id: UserID, connection: &Connection) -> Result<Vec<Budget>, Error> {
    let mut budgets: Vec<Budget> = connection
        .prepare(&format!(
            "SELECT {BUDGET_COLUMNS} FROM budget
            WHERE user_id = ?1
            ORDER BY start_date DESC, id DESC"
        ))?
        .query_map([user_id.as_i64()], map_budget_row)?
        .collect::<Result<_, _>>()?;

    let mut expenses_by_budget: BTreeMap<BudgetId, Vec<BudgetExpense>> = BTreeMap::new();
    connection
        .prepare(
            "SELECT e.id, e.budget_id, e.name, e.allocated_amount, e.accrued_amount
            FROM budget_expense e INNER JOIN budget b ON b.id = e.budget_id
            WHERE b.user_id = ?1
            ORDER BY e.id",
        )?
        .query_map([user_id.as_i64()], map_budget_expense_row)?
        .try_for_each(|result| {
            let expense = result?;
            expenses_by_budget
                .entry(expense.budget_id)
                .or_default()
                .push(expense);
            Ok::<_, rusqlite::Error>(())
        })?;

    for budget in &mut budgets {
        budget.expenses = expenses_by_budget.remove(&budget.id).unwrap_or_default();
    }

    Ok(budgets)
}

/// Update the fields of the budget `id` and apply its expense lines as a diff.
///
/// Lines without an ID (or with `-1`) are inserted, lines with the ID of an
/// existing line are updated in place, and existing lines that are not in the
/// form are left untouched. Nothing is applied if any line is invalid.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] or [Error::Forbidden] as per [get_budget],
/// - [Error::Validation] if the form is invalid or a line ID belongs to another budget,
/// - or [Error::SqlError] there is some other SQL error.
pub fn update_budget(
    id: BudgetId,
    user_id: UserID,
    form: BudgetForm,
    connection: &Connection,
) -> Result<Budget, Error> {
    let sql_transaction = connection.unchecked_transaction()?;
    let existing = get_budget(id, user_id, &sql_transaction)?;
    form.validate()?;

    sql_transaction.execute(
        "UPDATE budget SET name = ?1, description = ?2, amount = ?3, start_date = ?4, end_date = ?5
        WHERE id = ?6",
        params![
            form.name.trim(),
            form.description,
            form.amount,
            form.start_date,
            form.end_date,
            id
        ],
    )?;

    for line in &form.expenses {
        match line.existing_id() {
            None => {
                insert_expense(id, line, &sql_transaction)?;
            }
            Some(expense_id) => {
                let Some(current) = existing
                    .expenses
                    .iter()
                    .find(|expense| expense.id == expense_id)
                else {
                    return Err(Error::Validation(format!(
                        "expense line {expense_id} does not belong to budget {id}"
                    )));
                };

                if current.name != line.name.trim() || current.allocated_amount != line.allocated_amount {
                    write_expense_fields(expense_id, line, &sql_transaction)?;
                }
            }
        }
    }

    let budget = query_budget(id, &sql_transaction)?;
    sql_transaction.commit()?;

    Ok(budget)
}

fn write_expense_fields(
    expense_id: BudgetExpenseId,
    line: &BudgetExpenseForm,
    connection: &Connection,
) -> Result<BudgetExpense, Error> {
    connection
        .prepare(&format!(
            "UPDATE budget_expense SET name = ?1, allocated_amount = ?2 WHERE id = ?3
            RETURNING {EXPENSE_COLUMNS}"
        ))?
        .query_row(
            params![line.name.trim(), line.allocated_amount, expense_id],
            map_budget_expense_row,
        )
        .map_err(Error::from)
}

/// Add an expense line to the budget `budget_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] or [Error::Forbidden] as per [get_budget],
/// - [Error::Validation] if the line is invalid,
/// - or [Error::SqlError] there is some other SQL error.
pub fn add_budget_expense(
    budget_id: BudgetId,
    user_id: UserID,
    line: BudgetExpenseForm,
    connection: &Connection,
) -> Result<BudgetExpense, Error> {
    get_budget(budget_id, user_id, connection)?;
    line.validate()?;

    insert_expense(budget_id, &line, connection)
}

/// Change the name and allocation of the expense line `expense_id`.
///
/// The accrued amount is not affected.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] or [Error::Forbidden] as per [get_budget],
/// - [Error::NotFound] if the line is not part of the budget,
/// - [Error::Validation] if the line is invalid,
/// - or [Error::SqlError] there is some other SQL error.
pub fn update_budget_expense(
    budget_id: BudgetId,
    expense_id: BudgetExpenseId,
    user_id: UserID,
    line: BudgetExpenseForm,
    connection: &Connection,
) -> Result<BudgetExpense, Error> {
    get_budget(budget_id, user_id, connection)?;
    get_budget_expense(budget_id, expense_id, connection)?;
    line.validate()?;

    write_expense_fields(expense_id, &line, connection)
}

/// Detach every transaction linked to the expense line `expense_id`, then delete the line.
///
/// # Errors
/// This function will return the same errors as [update_budget_expense],
/// minus the validation error.
pub fn remove_budget_expense(
    budget_id: BudgetId,
    expense_id: BudgetExpenseId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let sql_transaction = connection.unchecked_transaction()?;
    get_budget(budget_id, user_id, &sql_transaction)?;
    get_budget_expense(budget_id, expense_id, &sql_transaction)?;

    detach_expense(expense_id, &sql_transaction)?;
    sql_transaction.execute("DELETE FROM budget_expense WHERE id = ?1", [expense_id])?;

    sql_transaction.commit()?;

    Ok(())
}

/// Delete the budget `id`.
///
/// Transactions linked to any of its lines are detached, then the lines are
/// deleted, then the budget, as one atomic unit.
///
/// # Errors
/// This function will return the same errors as [get_budget].
pub fn delete_budget(id: BudgetId, user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let sql_transaction = connection.unchecked_transaction()?;
    let budget = get_budget(id, user_id, &sql_transaction)?;

    for expense in &budget.expenses {
        detach_expense(expense.id, &sql_transaction)?;
    }
    sql_transaction.execute("DELETE FROM budget_expense WHERE budget_id = ?1", [id])?;
    sql_transaction.execute("DELETE FROM budget WHERE id = ?1", [id])?;

    sql_transaction.commit()?;

    tracing::debug!("Deleted budget {id}");

    Ok(())
}

#[cfg(test)]
mod database_tests {
    use time::macros::date;

    use crate::{
        Error, Money,
        budget::{
            BudgetExpenseForm, BudgetForm, add_budget_expense, create_budget, delete_budget,
            get_budget, list_budgets, remove_budget_expense, update_budget,
            update_budget_expense,
        },
        test_utils::{create_test_user, get_test_connection},
    };

    fn line(name: &str, cents: i64) -> BudgetExpenseForm {
        BudgetExpenseForm {
            id: None,
            name: name.to_owned(),
            allocated_amount: Money::from_cents(cents),
        }
    }

    fn march_budget() -> BudgetForm {
        BudgetForm {
            name: "March".to_owned(),
            description: "Tight month".to_owned(),
            amount: Money::from_cents(300_000),
            start_date: date!(2024 - 03 - 01),
            end_date: date!(2024 - 03 - 31),
            expenses: vec![
                line("Groceries", 60_000),
                line("Rent", 200_000),
                line("Fun", 10_000),
            ],
        }
    }

    fn count(conn: &rusqlite::Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn create_stores_budget_and_lines() {
        let conn = get_test_connection();
        let user = create_test_user(&conn, "alice");

        let budget = create_budget(march_budget(), user.id, &conn).unwrap();

        assert_eq!(budget.name, "March");
        assert_eq!(budget.expenses.len(), 3);
        assert!(budget.expenses.iter().all(|e| e.accrued_amount == Money::ZERO));
        assert_eq!(get_budget(budget.id, user.id, &conn), Ok(budget));
    }

    #[test]
    fn create_is_atomic() {
        let conn = get_test_connection();
        let user = create_test_user(&conn, "alice");
        conn.execute_batch(
            "CREATE TRIGGER fail_second_line BEFORE INSERT ON budget_expense
            WHEN (SELECT COUNT(*) FROM budget_expense) >= 1
            BEGIN SELECT RAISE(ABORT, 'simulated storage fault'); END;",
        )
        .unwrap();

        let result = create_budget(march_budget(), user.id, &conn);

        assert!(matches!(result, Err(Error::SqlError(_))));
        assert_eq!(count(&conn, "budget"), 0);
        assert_eq!(count(&conn, "budget_expense"), 0);
    }

    #[test]
    fn create_rejects_invalid_budget() {
        let conn = get_test_connection();
        let user = create_test_user(&conn, "alice");
        let form = BudgetForm {
            name: String::new(),
            ..march_budget()
        };

        let result = create_budget(form, user.id, &conn);

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(count(&conn, "budget"), 0);
    }

    #[test]
    fn get_checks_owner() {
        let conn = get_test_connection();
        let alice = create_test_user(&conn, "alice");
        let bob = create_test_user(&conn, "bob");
        let budget = create_budget(march_budget(), alice.id, &conn).unwrap();

        assert_eq!(get_budget(budget.id, bob.id, &conn), Err(Error::Forbidden));
        assert_eq!(get_budget(budget.id + 1, alice.id, &conn), Err(Error::NotFound));
    }

    #[test]
    fn list_orders_by_start_date_descending() {
        let conn = get_test_connection();
        let alice = create_test_user(&conn, "alice");
        let bob = create_test_user(&conn, "bob");
        let march = create_budget(march_budget(), alice.id, &conn).unwrap();
        let april = create_budget(
            BudgetForm {
                name: "April".to_owned(),
                start_date: date!(2024 - 04 - 01),
                end_date: date!(2024 - 04 - 30),
                expenses: vec![],
                ..march_budget()
            },
            alice.id,
            &conn,
        )
        .unwrap();
        create_budget(march_budget(), bob.id, &conn).unwrap();

        let budgets = list_budgets(alice.id, &conn).unwrap();

        assert_eq!(budgets, vec![april, march]);
    }

    #[test]
    fn update_applies_lines_as_diff() {
        let conn = get_test_connection();
        let user = create_test_user(&conn, "alice");
        let budget = create_budget(march_budget(), user.id, &conn).unwrap();
        let groceries = budget.expenses[0].clone();
        let rent = budget.expenses[1].clone();
        let fun = budget.expenses[2].clone();

        let updated = update_budget(
            budget.id,
            user.id,
            BudgetForm {
                name: "March (revised)".to_owned(),
                expenses: vec![
                    BudgetExpenseForm {
                        id: Some(groceries.id),
                        name: "Food".to_owned(),
                        allocated_amount: Money::from_cents(70_000),
                    },
                    BudgetExpenseForm {
                        id: Some(-1),
                        ..line("Transport", 5_000)
                    },
                ],
                ..march_budget()
            },
            &conn,
        )
        .unwrap();

        assert_eq!(updated.name, "March (revised)");
        assert_eq!(updated.expenses.len(), 4);
        assert_eq!(updated.expenses[0].name, "Food");
        assert_eq!(updated.expenses[0].allocated_amount, Money::from_cents(70_000));
        assert_eq!(updated.expenses[1], rent, "omitted lines are left untouched");
        assert_eq!(updated.expenses[2], fun, "omitted lines are left untouched");
        assert_eq!(updated.expenses[3].name, "Transport");
    }

    #[test]
    fn update_rejects_foreign_line_and_applies_nothing() {
        let conn = get_test_connection();
        let user = create_test_user(&conn, "alice");
        let budget = create_budget(march_budget(), user.id, &conn).unwrap();
        let other = create_budget(march_budget(), user.id, &conn).unwrap();

        let result = update_budget(
            budget.id,
            user.id,
            BudgetForm {
                name: "Changed".to_owned(),
                expenses: vec![
                    line("New line", 1_000),
                    BudgetExpenseForm {
                        id: Some(other.expenses[0].id),
                        ..line("Stolen", 1_000)
                    },
                ],
                ..march_budget()
            },
            &conn,
        );

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(get_budget(budget.id, user.id, &conn), Ok(budget));
    }

    #[test]
    fn expense_operations_check_owner() {
        let conn = get_test_connection();
        let alice = create_test_user(&conn, "alice");
        let bob = create_test_user(&conn, "bob");
        let budget = create_budget(march_budget(), alice.id, &conn).unwrap();
        let expense_id = budget.expenses[0].id;

        assert_eq!(
            add_budget_expense(budget.id, bob.id, line("Sneaky", 1), &conn),
            Err(Error::Forbidden)
        );
        assert_eq!(
            update_budget_expense(budget.id, expense_id, bob.id, line("Sneaky", 1), &conn),
            Err(Error::Forbidden)
        );
        assert_eq!(
            remove_budget_expense(budget.id, expense_id, bob.id, &conn),
            Err(Error::Forbidden)
        );
        assert_eq!(get_budget(budget.id, alice.id, &conn), Ok(budget));
    }

    #[test]
    fn add_update_and_remove_expense() {
        let conn = get_test_connection();
        let user = create_test_user(&conn, "alice");
        let budget = create_budget(march_budget(), user.id, &conn).unwrap();

        let added = add_budget_expense(budget.id, user.id, line("Gifts", 2_000), &conn).unwrap();
        let updated = update_budget_expense(
            budget.id,
            added.id,
            user.id,
            line("Presents", 3_000),
            &conn,
        )
        .unwrap();
        remove_budget_expense(budget.id, budget.expenses[0].id, user.id, &conn).unwrap();

        assert_eq!(updated.name, "Presents");
        assert_eq!(updated.allocated_amount, Money::from_cents(3_000));
        let names: Vec<_> = get_budget(budget.id, user.id, &conn)
            .unwrap()
            .expenses
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["Rent", "Fun", "Presents"]);
    }

    #[test]
    fn expense_must_belong_to_budget() {
        let conn = get_test_connection();
        let user = create_test_user(&conn, "alice");
        let budget = create_budget(march_budget(), user.id, &conn).unwrap();
        let other = create_budget(march_budget(), user.id, &conn).unwrap();

        assert_eq!(
            remove_budget_expense(budget.id, other.expenses[0].id, user.id, &conn),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn delete_removes_budget_and_lines() {
        let conn = get_test_connection();
        let user = create_test_user(&conn, "alice");
        let budget = create_budget(march_budget(), user.id, &conn).unwrap();

        delete_budget(budget.id, user.id, &conn).unwrap();

        assert_eq!(get_budget(budget.id, user.id, &conn), Err(Error::NotFound));
        assert_eq!(count(&conn, "budget_expense"), 0);
    }
}
