//! Defines the core data models for transactions.

use std::{fmt::Display, str::FromStr};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error, Money, UserID,
    database_id::{BudgetExpenseId, BudgetId, RecurringTemplateId, TransactionId},
};

// ============================================================================
// MODELS
// ============================================================================

/// The category of a transaction.
///
/// Every type is either an income type or an expense type, which determines
/// the sign of the transaction's amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Salary,
    Freelance,
    Investment,
    Gift,
    Refund,
    OtherIncome,
    Housing,
    Utilities,
    Groceries,
    Transport,
    Dining,
    Entertainment,
    Health,
    Insurance,
    Shopping,
    Travel,
    Education,
    Subscriptions,
    OtherExpense,
}

impl TransactionType {
    /// The transaction types that represent money coming in.
    pub const INCOME: [TransactionType; 6] = [
        Self::Salary,
        Self::Freelance,
        Self::Investment,
        Self::Gift,
        Self::Refund,
        Self::OtherIncome,
    ];

    /// The transaction types that represent money going out.
    pub const EXPENSE: [TransactionType; 13] = [
        Self::Housing,
        Self::Utilities,
        Self::Groceries,
        Self::Transport,
        Self::Dining,
        Self::Entertainment,
        Self::Health,
        Self::Insurance,
        Self::Shopping,
        Self::Travel,
        Self::Education,
        Self::Subscriptions,
        Self::OtherExpense,
    ];

    /// The tag used for this type in the database and the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Salary => "salary",
            Self::Freelance => "freelance",
            Self::Investment => "investment",
            Self::Gift => "gift",
            Self::Refund => "refund",
            Self::OtherIncome => "other_income",
            Self::Housing => "housing",
            Self::Utilities => "utilities",
            Self::Groceries => "groceries",
            Self::Transport => "transport",
            Self::Dining => "dining",
            Self::Entertainment => "entertainment",
            Self::Health => "health",
            Self::Insurance => "insurance",
            Self::Shopping => "shopping",
            Self::Travel => "travel",
            Self::Education => "education",
            Self::Subscriptions => "subscriptions",
            Self::OtherExpense => "other_expense",
        }
    }

    /// Whether the type represents money coming in.
    pub fn is_income(&self) -> bool {
        Self::INCOME.contains(self)
    }

    /// Give `amount` the sign that matches this type: positive for income,
    /// negative for expenses.
    pub fn signed_amount(&self, amount: Money) -> Money {
        if self.is_income() {
            amount.abs()
        } else {
            -amount.abs()
        }
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::INCOME
            .iter()
            .chain(Self::EXPENSE.iter())
            .find(|transaction_type| transaction_type.as_str() == s)
            .copied()
            .ok_or_else(|| Error::Validation(format!("\"{s}\" is not a known transaction type")))
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: Error| FromSqlError::Other(Box::new(error)))
    }
}

/// The association between a transaction and a budget expense line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetLink {
    /// The budget that owns the expense line.
    pub budget_id: BudgetId,
    /// The expense line the transaction counts towards.
    pub budget_expense_id: BudgetExpenseId,
}

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user that owns the transaction.
    pub user_id: UserID,
    /// The amount of money spent (negative) or earned (positive).
    pub amount: Money,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The category of the transaction.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// When the transaction happened.
    pub date: Date,
    /// The recurring transaction this transaction was generated from, if any.
    ///
    /// Generated transactions can only be changed through their template.
    pub recurring_template_id: Option<RecurringTemplateId>,
    /// The budget expense line the transaction is linked to, if any.
    pub budget: Option<BudgetLink>,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(
        amount: Money,
        date: Date,
        description: &str,
        transaction_type: TransactionType,
    ) -> TransactionBuilder {
        TransactionBuilder {
            amount,
            date,
            description: description.to_owned(),
            transaction_type,
            recurring_template_id: None,
        }
    }
}

/// A builder for creating [Transaction] instances.
///
/// The amount is given the sign that matches the transaction type when the
/// transaction is stored, so callers may pass either `45.99` or `-45.99` for
/// an expense.
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// The monetary amount of the transaction.
    pub amount: Money,
    /// The date when the transaction occurred.
    pub date: Date,
    /// A human-readable description of the transaction.
    pub description: String,
    /// The category of the transaction.
    pub transaction_type: TransactionType,
    /// The template this transaction is an occurrence of.
    pub recurring_template_id: Option<RecurringTemplateId>,
}

impl TransactionBuilder {
    /// Mark the transaction as an occurrence of a recurring template.
    pub fn recurring_template_id(mut self, template_id: Option<RecurringTemplateId>) -> Self {
        self.recurring_template_id = template_id;
        self
    }
}

/// The fields of a transaction that can be edited directly.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransactionUpdate {
    /// The new amount, the sign is normalized from the transaction type.
    pub amount: Money,
    /// The new description.
    pub description: String,
    /// The new transaction type.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// The new date.
    pub date: Date,
}

/// Which transactions to include when listing by date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFilter {
    /// Income and expenses.
    All,
    /// Only transactions with an income type.
    Income,
    /// Only transactions with an expense type.
    Expense,
}

impl From<Option<bool>> for TypeFilter {
    /// Map the `income` query parameter to a filter, where a missing parameter means all.
    fn from(income: Option<bool>) -> Self {
        match income {
            None => Self::All,
            Some(true) => Self::Income,
            Some(false) => Self::Expense,
        }
    }
}

impl TypeFilter {
    /// Whether `transaction` passes the filter.
    pub fn matches(&self, transaction: &Transaction) -> bool {
        match self {
            Self::All => true,
            Self::Income => transaction.transaction_type.is_income(),
            Self::Expense => !transaction.transaction_type.is_income(),
        }
    }
}

#[cfg(test)]
mod transaction_type_tests {
    use crate::{Error, Money, transaction::TransactionType};

    #[test]
    fn every_type_round_trips_through_its_tag() {
        for transaction_type in TransactionType::INCOME
            .iter()
            .chain(TransactionType::EXPENSE.iter())
        {
            assert_eq!(
                transaction_type.as_str().parse::<TransactionType>(),
                Ok(*transaction_type)
            );
        }
    }

    #[test]
    fn unknown_tag_is_a_validation_error() {
        let result = "lottery".parse::<TransactionType>();

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn serde_uses_snake_case_tags() {
        let json = serde_json::to_string(&TransactionType::OtherIncome).unwrap();

        assert_eq!(json, "\"other_income\"");
    }

    #[test]
    fn signed_amount_follows_type() {
        let amount = Money::from_cents(4599);

        assert_eq!(TransactionType::Salary.signed_amount(-amount), amount);
        assert_eq!(TransactionType::Groceries.signed_amount(amount), -amount);
        assert_eq!(TransactionType::Groceries.signed_amount(-amount), -amount);
    }
}
