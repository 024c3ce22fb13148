//! Monthly and yearly income and expense summaries.

mod aggregation;
mod handlers;

pub use aggregation::{
    MonthSummary, Summary, TypeSummary, YearSummary, month_summary, month_summary_by_type,
    summarize, summarize_by_type, year_summary, year_summary_by_type,
};
pub use handlers::{
    get_month_summary, get_month_summary_by_type, get_year_summary, get_year_summary_by_type,
};
