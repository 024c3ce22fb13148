//! Integer IDs for rows in the application database.

/// Database identifier for a transaction.
pub type TransactionId = i64;

/// Database identifier for a recurring transaction template.
pub type RecurringTemplateId = i64;

/// Database identifier for a budget.
pub type BudgetId = i64;

/// Database identifier for a budget expense line.
pub type BudgetExpenseId = i64;

/// Sentinel ID used by clients to mean "no row".
///
/// In budget payloads it marks an expense line that should be created, and in
/// link requests it marks an expense or transaction that should be skipped.
pub const UNASSIGNED_ID: i64 = -1;
