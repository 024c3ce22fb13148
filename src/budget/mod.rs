//! Budgets and the expense lines that split them into categories of spending.

mod core;
mod db;
mod endpoints;

pub use core::{Budget, BudgetExpense, BudgetExpenseForm, BudgetForm};
pub use db::{
    add_budget_expense, create_budget, create_budget_expense_table, create_budget_table,
    delete_budget, get_budget, get_budget_expense, list_budgets, remove_budget_expense,
    update_budget, update_budget_expense,
};
pub use endpoints::{
    create_budget_endpoint, create_budget_expense_endpoint, delete_budget_endpoint,
    delete_budget_expense_endpoint, get_budget_endpoint, get_budgets, link_transactions_endpoint,
    reconcile_budget_endpoint, update_budget_endpoint, update_budget_expense_endpoint,
};

#[cfg(test)]
pub use endpoints::BudgetDetails;
