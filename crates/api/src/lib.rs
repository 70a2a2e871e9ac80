//! HTTP adapter for the clinic core.
//!
//! Exposes appointments, carts, settlement and billing over REST, with
//! structured logging (tracing) and Prometheus metrics. All behavior lives
//! in the domain, settlement and projections crates; handlers only parse,
//! delegate and map errors.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post, put};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::AppState;

use routes::{appointments, billings, carts, catalog, ops};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(ops::health))
        // Appointments
        .route("/appointments", post(appointments::book::<S>))
        .route("/appointments/{id}", get(appointments::get::<S>))
        .route(
            "/appointments/{id}/reschedule",
            post(appointments::reschedule::<S>),
        )
        .route("/appointments/{id}/confirm", post(appointments::confirm::<S>))
        .route("/appointments/{id}/cancel", post(appointments::cancel::<S>))
        .route("/appointments/{id}/note", put(appointments::update_note::<S>))
        .route(
            "/patients/{id}/appointments",
            get(appointments::for_patient::<S>),
        )
        .route(
            "/doctors/{id}/appointments",
            get(appointments::for_doctor::<S>),
        )
        .route(
            "/patients/{id}/doctors/{doctor_id}/history",
            get(appointments::visit_history::<S>),
        )
        // Carts
        .route("/patients/{id}/cart", post(carts::open_for_patient::<S>))
        .route(
            "/carts/{id}",
            get(carts::get::<S>).delete(carts::delete::<S>),
        )
        .route(
            "/carts/{id}/lines",
            post(carts::add_lines::<S>).put(carts::replace_lines::<S>),
        )
        .route(
            "/carts/{id}/lines/{medication_id}",
            patch(carts::update_line_quantity::<S>).delete(carts::remove_line::<S>),
        )
        .route(
            "/carts/{id}/payment-intent",
            post(carts::payment_intent::<S>),
        )
        .route("/carts/{id}/settle", post(billings::settle::<S>))
        // Billings
        .route("/billings", get(billings::list::<S>))
        .route(
            "/billings/{id}",
            get(billings::get::<S>).delete(billings::revert::<S>),
        )
        .route("/billings/{id}/cart", put(billings::change_cart::<S>))
        // Seeding
        .route("/directory/patients", post(catalog::add_patient::<S>))
        .route("/directory/doctors", post(catalog::add_doctor::<S>))
        .route("/medications", put(catalog::upsert_medication::<S>))
        .route("/stock/{medication_id}", get(catalog::stock_level::<S>))
        .route(
            "/stock/{medication_id}/restock",
            post(catalog::restock::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
