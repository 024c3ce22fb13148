//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{
    AppState, Error,
    auth::{auth_guard, get_current_user, post_demo_log_in, post_log_out},
    budget::{
        create_budget_endpoint, create_budget_expense_endpoint, delete_budget_endpoint,
        delete_budget_expense_endpoint, get_budget_endpoint, get_budgets,
        link_transactions_endpoint, reconcile_budget_endpoint, update_budget_endpoint,
        update_budget_expense_endpoint,
    },
    endpoints,
    logging::logging_middleware,
    summary::{
        get_month_summary, get_month_summary_by_type, get_year_summary, get_year_summary_by_type,
    },
    transaction::{
        create_transaction_endpoint, delete_recurring_template_endpoint,
        delete_transaction_endpoint, get_expense_types, get_income_types, get_interval_types,
        get_recurring_template_endpoint, get_recurring_templates, get_transaction_endpoint,
        get_transactions, get_unassigned_transactions, unlink_transaction_endpoint,
        update_recurring_template_endpoint, update_transaction_endpoint,
    },
};

/// Return a router with all the app's routes.
///
/// Every request is given an `x-request-id` header, which is echoed in the
/// response and recorded on the request's tracing span.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::DEMO_LOG_IN, post(post_demo_log_in))
        .route(endpoints::LOG_OUT, post(post_log_out));

    let protected_routes = Router::new()
        .route(endpoints::CURRENT_USER, get(get_current_user))
        .route(
            endpoints::TRANSACTIONS,
            get(get_transactions).post(create_transaction_endpoint),
        )
        .route(
            endpoints::UNASSIGNED_TRANSACTIONS,
            get(get_unassigned_transactions),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint)
                .put(update_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTION_BUDGET,
            delete(unlink_transaction_endpoint),
        )
        .route(endpoints::INTERVAL_TYPES, get(get_interval_types))
        .route(endpoints::INCOME_TYPES, get(get_income_types))
        .route(endpoints::EXPENSE_TYPES, get(get_expense_types))
        .route(endpoints::MONTH_SUMMARY, get(get_month_summary))
        .route(
            endpoints::MONTH_SUMMARY_BY_TYPE,
            get(get_month_summary_by_type),
        )
        .route(endpoints::YEAR_SUMMARY, get(get_year_summary))
        .route(
            endpoints::YEAR_SUMMARY_BY_TYPE,
            get(get_year_summary_by_type),
        )
        .route(
            endpoints::RECURRING_TRANSACTIONS,
            get(get_recurring_templates),
        )
        .route(
            endpoints::RECURRING_TRANSACTION,
            get(get_recurring_template_endpoint)
                .put(update_recurring_template_endpoint)
                .delete(delete_recurring_template_endpoint),
        )
        .route(
            endpoints::BUDGETS,
            get(get_budgets).post(create_budget_endpoint),
        )
        .route(
            endpoints::BUDGET,
            get(get_budget_endpoint)
                .put(update_budget_endpoint)
                .delete(delete_budget_endpoint),
        )
        .route(
            endpoints::BUDGET_EXPENSES,
            post(create_budget_expense_endpoint),
        )
        .route(
            endpoints::BUDGET_EXPENSE,
            put(update_budget_expense_endpoint)
                .delete(delete_budget_expense_endpoint),
        )
        .route(
            endpoints::BUDGET_EXPENSE_TRANSACTIONS,
            post(link_transactions_endpoint),
        )
        .route(endpoints::BUDGET_RECONCILE, post(reconcile_budget_endpoint))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    let router = protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .with_state(state);

    add_tracing_layers(router)
}

fn add_tracing_layers(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            let request_id = req
                .extensions()
                .get::<RequestId>()
                .and_then(|id| id.header_value().to_str().ok());

            tracing::debug_span!("request", %method, %uri, matched_path, request_id)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router
        .layer(middleware::from_fn(logging_middleware))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(tracing_layer)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn get_404_not_found() -> Error {
    Error::NotFound
}
