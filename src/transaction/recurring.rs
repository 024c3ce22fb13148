//! Recurring transaction templates and the occurrences generated from them.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
    str::FromStr,
};

use rusqlite::{
    Connection, Row, params,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::{Date, Duration, Month};

use crate::{
    Error, Money, UserID,
    database_id::RecurringTemplateId,
    reconcile::recompute_expense,
    transaction::{
        TRANSACTION_COLUMNS, Transaction, TransactionBuilder, TransactionType,
        create_transaction, map_transaction_row,
    },
};

/// The most occurrences a single template may generate, roughly ten years of daily entries.
pub const MAX_OCCURRENCES: usize = 3660;

/// The longest gap, in days, allowed between two occurrences.
pub const MAX_DAYS_INTERVAL: i64 = MAX_OCCURRENCES as i64;

/// How often a recurring transaction repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Interval {
    /// All intervals, in the order they are presented to clients.
    pub const ALL: [Interval; 4] = [Self::Daily, Self::Weekly, Self::Monthly, Self::Yearly];

    /// The tag used for this interval in the database and the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl FromStr for Interval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|interval| interval.as_str() == s)
            .copied()
            .ok_or_else(|| Error::Validation(format!("\"{s}\" is not a known interval")))
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for Interval {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Interval {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: Error| FromSqlError::Other(Box::new(error)))
    }
}

/// When a recurring transaction happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// The date of the first occurrence.
    pub start_date: Date,
    /// The last date an occurrence may fall on, `None` means up to today.
    pub end_date: Option<Date>,
    /// The cadence of the occurrences.
    pub interval: Interval,
    /// Repeat every `n` days instead of following `interval`.
    pub days_interval: Option<i64>,
}

impl Schedule {
    /// The dates of every occurrence from the start date through the end
    /// date, or through `today` for open-ended schedules.
    ///
    /// Monthly and yearly schedules keep the start date's day of the month,
    /// falling back to the last day of shorter months.
    ///
    /// # Errors
    /// Returns an [Error::Validation] if the end date is before the start
    /// date, the day interval is outside 1 to [MAX_DAYS_INTERVAL], or the schedule would
    /// produce more than [MAX_OCCURRENCES] dates.
    pub fn occurrence_dates(&self, today: Date) -> Result<Vec<Date>, Error> {
        if let Some(end_date) = self.end_date
            && end_date < self.start_date
        {
            return Err(Error::Validation(format!(
                "the end date {end_date} is before the start date {}",
                self.start_date
            )));
        }

        if let Some(days) = self.days_interval
            && !(1..=MAX_DAYS_INTERVAL).contains(&days)
        {
            return Err(Error::Validation(format!(
                "the day interval must be between 1 and {MAX_DAYS_INTERVAL}, got {days}"
            )));
        }

        let last = self.end_date.unwrap_or(today);
        let mut dates = Vec::new();

        for index in 0.. {
            let Some(date) = self.nth_occurrence(index) else {
                break;
            };

            if date > last {
                break;
            }

            if dates.len() == MAX_OCCURRENCES {
                return Err(Error::Validation(format!(
                    "the schedule produces more than {MAX_OCCURRENCES} occurrences"
                )));
            }

            dates.push(date);
        }

        Ok(dates)
    }

    /// The date of the occurrence `index` steps after the start date, or
    /// `None` if it is past the end of the calendar.
    fn nth_occurrence(&self, index: i64) -> Option<Date> {
        if let Some(days) = self.days_interval {
            let offset = days.checked_mul(index)?;
            return self.start_date.checked_add(Duration::days(offset));
        }

        match self.interval {
            Interval::Daily => self.start_date.checked_add(Duration::days(index)),
            Interval::Weekly => self.start_date.checked_add(Duration::weeks(index)),
            Interval::Monthly => add_months(self.start_date, index),
            Interval::Yearly => add_months(self.start_date, index * 12),
        }
    }
}

/// Add `months` to `date`, clamping the day to the length of the resulting month.
fn add_months(date: Date, months: i64) -> Option<Date> {
    let month_index = i64::from(date.year()) * 12 + i64::from(u8::from(date.month())) - 1 + months;
    let year = i32::try_from(month_index.div_euclid(12)).ok()?;
    let month = Month::try_from(u8::try_from(month_index.rem_euclid(12) + 1).ok()?).ok()?;
    let day = date.day().min(month.length(year));

    Date::from_calendar_date(year, month, day).ok()
}

/// A template that generates a transaction on every date of its schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringTemplate {
    /// The ID of the template.
    pub id: RecurringTemplateId,
    /// The user that owns the template and its occurrences.
    pub user_id: UserID,
    /// The amount of each occurrence, signed by the transaction type.
    pub amount: Money,
    /// The description copied to each occurrence.
    pub description: String,
    /// The type copied to each occurrence.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// When the occurrences happen.
    #[serde(flatten)]
    pub schedule: Schedule,
}

/// The client-provided fields of a recurring template.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecurringTemplateForm {
    /// The amount of each occurrence, the sign is normalized from the type.
    pub amount: Money,
    /// The description copied to each occurrence.
    #[serde(default)]
    pub description: String,
    /// The type copied to each occurrence.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// When the occurrences happen.
    #[serde(flatten)]
    pub schedule: Schedule,
}

/// Create the recurring template table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_recurring_template_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS recurring_transaction (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                amount TEXT NOT NULL,
                description TEXT NOT NULL,
                type TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT,
                interval TEXT NOT NULL,
                days_interval INTEGER,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_recurring_transaction_user ON recurring_transaction(user_id);",
        (),
    )?;

    Ok(())
}

fn map_template_row(row: &Row) -> Result<RecurringTemplate, rusqlite::Error> {
    Ok(RecurringTemplate {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        amount: row.get(2)?,
        description: row.get(3)?,
        transaction_type: row.get(4)?,
        schedule: Schedule {
            start_date: row.get(5)?,
            end_date: row.get(6)?,
            interval: row.get(7)?,
            days_interval: row.get(8)?,
        },
    })
}

const TEMPLATE_COLUMNS: &str =
    "id, user_id, amount, description, type, start_date, end_date, interval, days_interval";

/// Create a recurring template and every occurrence up to its end date (or
/// `today`) as one atomic unit.
///
/// # Errors
/// This function will return a:
/// - [Error::Validation] if the schedule is invalid or has no occurrences,
/// - or [Error::SqlError] if there is an SQL error.
pub fn create_recurring_template(
    form: RecurringTemplateForm,
    user_id: UserID,
    today: Date,
    connection: &Connection,
) -> Result<RecurringTemplate, Error> {
    let dates = form.schedule.occurrence_dates(today)?;
    if dates.is_empty() {
        return Err(Error::Validation(format!(
            "the recurring transaction starting {} has no occurrences yet",
            form.schedule.start_date
        )));
    }

    let amount = form.transaction_type.signed_amount(form.amount);
    let sql_transaction = connection.unchecked_transaction()?;

    let template = sql_transaction
        .prepare(&format!(
            "INSERT INTO recurring_transaction
            (user_id, amount, description, type, start_date, end_date, interval, days_interval)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            RETURNING {TEMPLATE_COLUMNS}"
        ))?
        .query_row(
            params![
                user_id.as_i64(),
                amount,
                form.description,
                form.transaction_type,
                form.schedule.start_date,
                form.schedule.end_date,
                form.schedule.interval,
                form.schedule.days_interval,
            ],
            map_template_row,
        )?;

    for date in &dates {
        create_transaction(occurrence(&template, *date), user_id, &sql_transaction)?;
    }

    sql_transaction.commit()?;

    tracing::debug!(
        "Created recurring transaction {} with {} occurrences",
        template.id,
        dates.len()
    );

    Ok(template)
}

fn occurrence(template: &RecurringTemplate, date: Date) -> TransactionBuilder {
    Transaction::build(
        template.amount,
        date,
        &template.description,
        template.transaction_type,
    )
    .recurring_template_id(Some(template.id))
}

/// Retrieve the recurring template `id` owned by `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a template,
/// - [Error::Forbidden] if the template belongs to another user,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_recurring_template(
    id: RecurringTemplateId,
    user_id: UserID,
    connection: &Connection,
) -> Result<RecurringTemplate, Error> {
    let template = connection
        .prepare(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM recurring_transaction WHERE id = :id"
        ))?
        .query_one(&[(":id", &id)], map_template_row)?;

    if template.user_id != user_id {
        return Err(Error::Forbidden);
    }

    Ok(template)
}

/// List the recurring templates owned by `user_id`, ordered by start date.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn list_recurring_templates(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<RecurringTemplate>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM recurring_transaction
            WHERE user_id = ?1 ORDER BY start_date, id"
        ))?
        .query_map([user_id.as_i64()], map_template_row)?
        .map(|result| result.map_err(Error::from))
        .collect()
}

/// List the transactions generated from the template `id`, ordered by date.
///
/// # Errors
/// This function will return the same errors as [get_recurring_template].
pub fn list_template_occurrences(
    id: RecurringTemplateId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    get_recurring_template(id, user_id, connection)?;

    query_occurrences(id, connection)
}

fn query_occurrences(
    id: RecurringTemplateId,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
            WHERE recurring_template_id = ?1 ORDER BY date, id"
        ))?
        .query_map([id], map_transaction_row)?
        .map(|result| result.map_err(Error::from))
        .collect()
}

/// Replace the fields of the template `id` and bring its occurrences in line
/// with the new schedule.
///
/// Occurrences on dates that are still scheduled are updated in place and
/// keep their budget links. Occurrences on dates that are no longer scheduled
/// are removed, and occurrences are added for newly scheduled dates. The
/// accrued amounts of affected budget expense lines are recomputed in the
/// same database transaction.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] or [Error::Forbidden] as per [get_recurring_template],
/// - [Error::Validation] if the new schedule is invalid or has no occurrences,
/// - or [Error::SqlError] there is some other SQL error.
pub fn update_recurring_template(
    id: RecurringTemplateId,
    user_id: UserID,
    form: RecurringTemplateForm,
    today: Date,
    connection: &Connection,
) -> Result<RecurringTemplate, Error> {
    let sql_transaction = connection.unchecked_transaction()?;
    get_recurring_template(id, user_id, &sql_transaction)?;

    let dates: BTreeSet<Date> = form
        .schedule
        .occurrence_dates(today)?
        .into_iter()
        .collect();
    if dates.is_empty() {
        return Err(Error::Validation(format!(
            "the recurring transaction starting {} has no occurrences yet",
            form.schedule.start_date
        )));
    }

    let amount = form.transaction_type.signed_amount(form.amount);
    let template = sql_transaction
        .prepare(&format!(
            "UPDATE recurring_transaction
            SET amount = ?1, description = ?2, type = ?3, start_date = ?4, end_date = ?5,
                interval = ?6, days_interval = ?7
            WHERE id = ?8
            RETURNING {TEMPLATE_COLUMNS}"
        ))?
        .query_row(
            params![
                amount,
                form.description,
                form.transaction_type,
                form.schedule.start_date,
                form.schedule.end_date,
                form.schedule.interval,
                form.schedule.days_interval,
                id,
            ],
            map_template_row,
        )?;

    let existing: BTreeMap<Date, Transaction> = query_occurrences(id, &sql_transaction)?
        .into_iter()
        .map(|transaction| (transaction.date, transaction))
        .collect();
    let mut touched_expenses = BTreeSet::new();

    for (date, transaction) in &existing {
        if let Some(link) = transaction.budget {
            touched_expenses.insert(link.budget_expense_id);
        }

        if dates.contains(date) {
            sql_transaction.execute(
                "UPDATE \"transaction\" SET amount = ?1, description = ?2, type = ?3 WHERE id = ?4",
                params![
                    template.amount,
                    template.description,
                    template.transaction_type,
                    transaction.id
                ],
            )?;
        } else {
            sql_transaction.execute("DELETE FROM \"transaction\" WHERE id = ?1", [transaction.id])?;
        }
    }

    for date in dates.iter().filter(|date| !existing.contains_key(date)) {
        create_transaction(occurrence(&template, *date), user_id, &sql_transaction)?;
    }

    for budget_expense_id in touched_expenses {
        recompute_expense(budget_expense_id, &sql_transaction)?;
    }

    sql_transaction.commit()?;

    Ok(template)
}

/// Delete the template `id` and all of its occurrences.
///
/// Budget expense lines that had occurrences linked to them are recomputed
/// in the same database transaction.
///
/// # Errors
/// This function will return the same errors as [get_recurring_template].
pub fn delete_recurring_template(
    id: RecurringTemplateId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let sql_transaction = connection.unchecked_transaction()?;
    get_recurring_template(id, user_id, &sql_transaction)?;

    let touched_expenses: BTreeSet<_> = query_occurrences(id, &sql_transaction)?
        .into_iter()
        .filter_map(|transaction| transaction.budget)
        .map(|link| link.budget_expense_id)
        .collect();

    sql_transaction.execute(
        "DELETE FROM \"transaction\" WHERE recurring_template_id = ?1",
        [id],
    )?;
    sql_transaction.execute("DELETE FROM recurring_transaction WHERE id = ?1", [id])?;

    for budget_expense_id in touched_expenses {
        recompute_expense(budget_expense_id, &sql_transaction)?;
    }

    sql_transaction.commit()?;

    Ok(())
}

#[cfg(test)]
mod schedule_tests {
    use time::macros::date;

    use crate::{
        Error,
        transaction::{Interval, MAX_DAYS_INTERVAL, MAX_OCCURRENCES, Schedule},
    };

    fn schedule(interval: Interval) -> Schedule {
        Schedule {
            start_date: date!(2024 - 01 - 15),
            end_date: Some(date!(2024 - 04 - 15)),
            interval,
            days_interval: None,
        }
    }

    #[test]
    fn monthly_steps_on_the_same_day() {
        let dates = schedule(Interval::Monthly)
            .occurrence_dates(date!(2030 - 01 - 01))
            .unwrap();

        assert_eq!(
            dates,
            vec![
                date!(2024 - 01 - 15),
                date!(2024 - 02 - 15),
                date!(2024 - 03 - 15),
                date!(2024 - 04 - 15),
            ]
        );
    }

    #[test]
    fn monthly_clamps_to_month_end_without_drifting() {
        let dates = Schedule {
            start_date: date!(2024 - 01 - 31),
            end_date: Some(date!(2024 - 04 - 30)),
            interval: Interval::Monthly,
            days_interval: None,
        }
        .occurrence_dates(date!(2030 - 01 - 01))
        .unwrap();

        assert_eq!(
            dates,
            vec![
                date!(2024 - 01 - 31),
                date!(2024 - 02 - 29),
                date!(2024 - 03 - 31),
                date!(2024 - 04 - 30),
            ]
        );
    }

    #[test]
    fn yearly_handles_leap_day() {
        let dates = Schedule {
            start_date: date!(2024 - 02 - 29),
            end_date: Some(date!(2028 - 03 - 01)),
            interval: Interval::Yearly,
            days_interval: None,
        }
        .occurrence_dates(date!(2030 - 01 - 01))
        .unwrap();

        assert_eq!(
            dates,
            vec![
                date!(2024 - 02 - 29),
                date!(2025 - 02 - 28),
                date!(2026 - 02 - 28),
                date!(2027 - 02 - 28),
                date!(2028 - 02 - 29),
            ]
        );
    }

    #[test]
    fn weekly_and_daily_step_by_days() {
        let weekly = schedule(Interval::Weekly)
            .occurrence_dates(date!(2030 - 01 - 01))
            .unwrap();
        let daily = schedule(Interval::Daily)
            .occurrence_dates(date!(2030 - 01 - 01))
            .unwrap();

        assert_eq!(weekly.len(), 14);
        assert_eq!(weekly[1], date!(2024 - 01 - 22));
        assert_eq!(daily.len(), 92);
    }

    #[test]
    fn days_interval_overrides_interval() {
        let dates = Schedule {
            days_interval: Some(10),
            end_date: Some(date!(2024 - 02 - 05)),
            ..schedule(Interval::Monthly)
        }
        .occurrence_dates(date!(2030 - 01 - 01))
        .unwrap();

        assert_eq!(
            dates,
            vec![
                date!(2024 - 01 - 15),
                date!(2024 - 01 - 25),
                date!(2024 - 02 - 04),
            ]
        );
    }

    #[test]
    fn open_ended_schedule_stops_at_today() {
        let dates = Schedule {
            end_date: None,
            ..schedule(Interval::Monthly)
        }
        .occurrence_dates(date!(2024 - 03 - 14))
        .unwrap();

        assert_eq!(dates, vec![date!(2024 - 01 - 15), date!(2024 - 02 - 15)]);
    }

    #[test]
    fn rejects_invalid_schedules() {
        let today = date!(2030 - 01 - 01);
        let reversed = Schedule {
            end_date: Some(date!(2024 - 01 - 14)),
            ..schedule(Interval::Monthly)
        };
        let zero_days = Schedule {
            days_interval: Some(0),
            ..schedule(Interval::Monthly)
        };
        let too_long = Schedule {
            start_date: date!(2000 - 01 - 01),
            end_date: Some(date!(2020 - 01 - 01)),
            interval: Interval::Daily,
            days_interval: None,
        };

        assert!(matches!(reversed.occurrence_dates(today), Err(Error::Validation(_))));
        assert!(matches!(zero_days.occurrence_dates(today), Err(Error::Validation(_))));
        assert!(matches!(too_long.occurrence_dates(today), Err(Error::Validation(_))));
    }

    #[test]
    fn rejects_huge_day_interval() {
        let huge = Schedule {
            days_interval: Some(200_000_000_000_000),
            ..schedule(Interval::Daily)
        };
        let just_over = Schedule {
            days_interval: Some(MAX_DAYS_INTERVAL + 1),
            ..schedule(Interval::Daily)
        };

        let today = date!(2030 - 01 - 01);
        assert!(matches!(huge.occurrence_dates(today), Err(Error::Validation(_))));
        assert!(matches!(just_over.occurrence_dates(today), Err(Error::Validation(_))));
    }

    #[test]
    fn longest_day_interval_yields_only_the_start() {
        let dates = Schedule {
            days_interval: Some(MAX_DAYS_INTERVAL),
            ..schedule(Interval::Daily)
        }
        .occurrence_dates(date!(2030 - 01 - 01))
        .unwrap();

        assert_eq!(dates, vec![date!(2024 - 01 - 15)]);
    }

    #[test]
    fn max_occurrences_is_allowed() {
        let start = date!(2000 - 01 - 01);
        let dates = Schedule {
            start_date: start,
            end_date: Some(start + time::Duration::days(MAX_OCCURRENCES as i64 - 1)),
            interval: Interval::Daily,
            days_interval: None,
        }
        .occurrence_dates(date!(2030 - 01 - 01))
        .unwrap();

        assert_eq!(dates.len(), MAX_OCCURRENCES);
    }
}
