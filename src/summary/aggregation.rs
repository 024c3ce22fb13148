//! Folds transactions into income, expense and per-type totals.

use std::collections::BTreeMap;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    Error, Money, UserID,
    date_range::DateRange,
    transaction::{Transaction, TransactionType, TypeFilter, list_transactions_between},
};

/// The income and expense totals of a period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// The sum of income.
    pub income: Money,
    /// The sum of expenses as a positive amount.
    pub expense: Money,
    /// Income minus expenses.
    pub net: Money,
}

/// The totals of a single month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthSummary {
    /// The month, 1 to 12.
    pub month: u8,
    /// The year.
    pub year: i32,
    /// The totals.
    #[serde(flatten)]
    pub summary: Summary,
}

/// The totals of a year and each of its months.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearSummary {
    /// The year.
    pub year: i32,
    /// The totals for the whole year.
    #[serde(flatten)]
    pub summary: Summary,
    /// The totals for January through December.
    pub months: Vec<MonthSummary>,
}

/// The summed amount of each transaction type in a period.
///
/// Types without transactions are left out. Amounts keep the sign of the
/// type, so expense types sum to negative amounts.
pub type TypeSummary = BTreeMap<TransactionType, Money>;

/// Fold `transactions` into income, expense and net totals.
pub fn summarize(transactions: &[Transaction]) -> Summary {
    let (income, expense) = transactions.iter().fold(
        (Money::ZERO, Money::ZERO),
        |(income, expense), transaction| {
            if transaction.transaction_type.is_income() {
                (income + transaction.amount.abs(), expense)
            } else {
                (income, expense + transaction.amount.abs())
            }
        },
    );

    Summary {
        income,
        expense,
        net: income - expense,
    }
}

/// Sum `transactions` by transaction type.
pub fn summarize_by_type(transactions: &[Transaction]) -> TypeSummary {
    let mut totals = TypeSummary::new();

    for transaction in transactions {
        let total = totals
            .entry(transaction.transaction_type)
            .or_insert(Money::ZERO);
        *total = *total + transaction.amount;
    }

    totals
}

fn list_all(
    user_id: UserID,
    range: DateRange,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    list_transactions_between(user_id, range, TypeFilter::All, connection)
}

/// The totals of `month` in `year` for `user_id`.
///
/// # Errors
/// Returns an [Error::Validation] if the month or year is invalid, or an
/// [Error::SqlError] if there is an SQL error.
pub fn month_summary(
    user_id: UserID,
    month: u8,
    year: i32,
    connection: &Connection,
) -> Result<MonthSummary, Error> {
    let transactions = list_all(user_id, DateRange::month(month, year)?, connection)?;

    Ok(MonthSummary {
        month,
        year,
        summary: summarize(&transactions),
    })
}

/// The per-type totals of `month` in `year` for `user_id`.
///
/// # Errors
/// Returns the same errors as [month_summary].
pub fn month_summary_by_type(
    user_id: UserID,
    month: u8,
    year: i32,
    connection: &Connection,
) -> Result<TypeSummary, Error> {
    let transactions = list_all(user_id, DateRange::month(month, year)?, connection)?;

    Ok(summarize_by_type(&transactions))
}

/// The totals of `year` for `user_id`, with a breakdown for every month.
///
/// # Errors
/// Returns the same errors as [month_summary].
pub fn year_summary(
    user_id: UserID,
    year: i32,
    connection: &Connection,
) -> Result<YearSummary, Error> {
    let transactions = list_all(user_id, DateRange::year(year)?, connection)?;

    let mut by_month: BTreeMap<u8, Vec<Transaction>> = BTreeMap::new();
    for transaction in &transactions {
        by_month
            .entry(u8::from(transaction.date.month()))
            .or_default()
            .push(transaction.clone());
    }

    let months = (1..=12u8)
        .map(|month| {
            let summary = by_month
                .get(&month)
                .map(Vec::as_slice)
                .map(summarize)
                .unwrap_or_default();

            MonthSummary {
                month,
                year,
                summary,
            }
        })
        .collect();

    Ok(YearSummary {
        year,
        summary: summarize(&transactions),
        months,
    })
}

/// The per-type totals of `year` for `user_id`.
///
/// # Errors
/// Returns the same errors as [month_summary].
pub fn year_summary_by_type(
    user_id: UserID,
    year: i32,
    connection: &Connection,
) -> Result<TypeSummary, Error> {
    let transactions = list_all(user_id, DateRange::year(year)?, connection)?;

    Ok(summarize_by_type(&transactions))
}
