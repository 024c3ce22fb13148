//! Transaction management for the budgeting application.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and `TransactionBuilder` for creating transactions
//! - Recurring templates that generate transactions on a schedule
//! - Database functions for storing, querying, and managing transactions
//! - Route handlers for the transaction and recurring transaction endpoints

mod core;
mod db;
mod endpoints;
mod recurring;
mod recurring_endpoints;

pub use core::{
    BudgetLink, Transaction, TransactionBuilder, TransactionType, TransactionUpdate, TypeFilter,
};
pub(crate) use db::{TRANSACTION_COLUMNS, clear_budget_link, list_expense_transactions, set_budget_link};
pub use db::{
    create_transaction, create_transaction_table, delete_transaction, get_transaction,
    list_budget_transactions, list_transactions_between, list_unassigned_between,
    map_transaction_row, update_transaction,
};
pub(crate) use endpoints::month_and_year;
pub use endpoints::{
    CreateTransactionRequest, CreatedTransaction, TransactionState, create_transaction_endpoint,
    delete_transaction_endpoint, get_expense_types, get_income_types, get_interval_types,
    get_transaction_endpoint, get_transactions, get_unassigned_transactions,
    unlink_transaction_endpoint, update_transaction_endpoint,
};
pub use recurring::{
    Interval, MAX_DAYS_INTERVAL, MAX_OCCURRENCES, RecurringTemplate, RecurringTemplateForm,
    Schedule, create_recurring_template, create_recurring_template_table, delete_recurring_template,
    get_recurring_template, list_recurring_templates, list_template_occurrences,
    update_recurring_template,
};
pub use recurring_endpoints::{
    RecurringTemplateDetails, delete_recurring_template_endpoint, get_recurring_template_endpoint,
    get_recurring_templates, update_recurring_template_endpoint,
};
