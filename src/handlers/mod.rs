pub mod health;
pub mod rpc;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/rpc/getCallerUserProfile", post(rpc::get_caller_user_profile))
        .route("/rpc/saveCallerUserProfile", post(rpc::save_caller_user_profile))
        .route("/rpc/getUserProfile", post(rpc::get_user_profile))
        .route("/rpc/getCallerLaborer", post(rpc::get_caller_laborer))
        .route("/rpc/saveCallerLaborer", post(rpc::save_caller_laborer))
        .route("/rpc/getLaborerById", post(rpc::get_laborer_by_id))
        .route(
            "/rpc/getLaborersByNeighborhood",
            post(rpc::get_laborers_by_neighborhood),
        )
        .route(
            "/rpc/getBookablesNearLocation",
            post(rpc::get_bookables_near_location),
        )
        .route("/rpc/createBooking", post(rpc::create_booking))
        .route("/rpc/updateBookingStatus", post(rpc::update_booking_status))
        .route("/rpc/updateBookingDetails", post(rpc::update_booking_details))
        .route("/rpc/assignCallerUserRole", post(rpc::assign_caller_user_role))
        .route("/rpc/getCallerUserRole", post(rpc::get_caller_user_role))
        .route("/rpc/isCallerAdmin", post(rpc::is_caller_admin))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
