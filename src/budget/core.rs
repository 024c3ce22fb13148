//! Defines the budget and budget expense line models and their validation.

use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error, Money, UserID,
    database_id::{BudgetExpenseId, BudgetId, UNASSIGNED_ID},
};

/// A spending plan over a period of time, split into expense lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// The ID of the budget.
    pub id: BudgetId,
    /// The user that owns the budget.
    pub user_id: UserID,
    /// A short name for the budget, e.g. "March 2024".
    pub name: String,
    /// Free text notes about the budget.
    pub description: String,
    /// The total amount of money available in the budget.
    pub amount: Money,
    /// The first day of the budget period.
    pub start_date: Date,
    /// The last day of the budget period.
    pub end_date: Date,
    /// The expense lines of the budget, ordered by ID.
    pub expenses: Vec<BudgetExpense>,
}

/// A line in a budget that allocates money to a category of spending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetExpense {
    /// The ID of the expense line.
    pub id: BudgetExpenseId,
    /// The budget the line belongs to.
    pub budget_id: BudgetId,
    /// A short name for the line, e.g. "Groceries".
    pub name: String,
    /// The money set aside for the line.
    pub allocated_amount: Money,
    /// The sum of the absolute amounts of the transactions linked to the line.
    pub accrued_amount: Money,
}

/// The client-provided fields of a budget.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BudgetForm {
    /// A short name for the budget.
    pub name: String,
    /// Free text notes about the budget.
    #[serde(default)]
    pub description: String,
    /// The total amount of money available in the budget.
    pub amount: Money,
    /// The first day of the budget period.
    pub start_date: Date,
    /// The last day of the budget period.
    pub end_date: Date,
    /// The expense lines to create or update.
    #[serde(default)]
    pub expenses: Vec<BudgetExpenseForm>,
}

/// The client-provided fields of a budget expense line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BudgetExpenseForm {
    /// The ID of an existing line, `None` or `-1` for a new line.
    #[serde(default)]
    pub id: Option<BudgetExpenseId>,
    /// A short name for the line.
    pub name: String,
    /// The money set aside for the line.
    pub allocated_amount: Money,
}

impl BudgetExpenseForm {
    /// The ID of the existing line this form refers to, or `None` for a new line.
    pub fn existing_id(&self) -> Option<BudgetExpenseId> {
        self.id.filter(|id| *id != UNASSIGNED_ID)
    }

    /// Check the line has a name and a non-negative allocation.
    ///
    /// # Errors
    /// Returns an [Error::Validation] describing the first problem found.
    pub fn validate(&self) -> Result<(), Error> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation(
                "budget expense name cannot be empty".to_owned(),
            ));
        }

        if self.allocated_amount.is_negative() {
            return Err(Error::Validation(format!(
                "the allocated amount for \"{}\" cannot be negative",
                self.name
            )));
        }

        Ok(())
    }
}

impl BudgetForm {
    /// Check the budget and each of its lines.
    ///
    /// # Errors
    /// Returns an [Error::Validation] if the name is empty, the amount is
    /// negative, the end date is before the start date, or a line is invalid.
    pub fn validate(&self) -> Result<(), Error> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("budget name cannot be empty".to_owned()));
        }

        if self.amount.is_negative() {
            return Err(Error::Validation(
                "budget amount cannot be negative".to_owned(),
            ));
        }

        if self.end_date < self.start_date {
            return Err(Error::Validation(format!(
                "the end date {} is before the start date {}",
                self.end_date, self.start_date
            )));
        }

        self.expenses.iter().try_for_each(BudgetExpenseForm::validate)
    }
}
