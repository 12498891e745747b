use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use crate::errors::ClientError;
use crate::models::{
    BookingInput, BookingResponse, LaborerInput, LaborerProfile, Principal, UserProfile, UserRole,
};
use crate::services::actor::wire::{
    AssignRoleArgs, BookingDetailsArgs, BookingStatusArgs, LaborerIdArgs, NearLocationArgs,
    NeighborhoodArgs, UserArgs, CALLER_HEADER, REQUEST_ID_HEADER,
};
use crate::state::AppState;

fn caller(headers: &HeaderMap) -> Principal {
    let caller = headers
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(Principal::from_text)
        .unwrap_or_else(Principal::anonymous);

    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    tracing::debug!(caller = %caller, request_id, "rpc call");
    caller
}

// ── Profiles ──

pub async fn get_caller_user_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<Option<UserProfile>> {
    Json(state.backend.get_caller_user_profile(&caller(&headers)))
}

pub async fn save_caller_user_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(profile): Json<UserProfile>,
) -> Result<Json<()>, ClientError> {
    state
        .backend
        .save_caller_user_profile(&caller(&headers), profile)?;
    Ok(Json(()))
}

pub async fn get_user_profile(
    State(state): State<Arc<AppState>>,
    Json(args): Json<UserArgs>,
) -> Json<Option<UserProfile>> {
    Json(state.backend.get_user_profile(&args.user))
}

// ── Laborers ──

pub async fn get_caller_laborer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<Option<LaborerProfile>> {
    Json(state.backend.get_caller_laborer(&caller(&headers)))
}

pub async fn save_caller_laborer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(input): Json<LaborerInput>,
) -> Result<Json<()>, ClientError> {
    state.backend.save_caller_laborer(&caller(&headers), input)?;
    Ok(Json(()))
}

pub async fn get_laborer_by_id(
    State(state): State<Arc<AppState>>,
    Json(args): Json<LaborerIdArgs>,
) -> Json<Option<LaborerProfile>> {
    Json(state.backend.get_laborer_by_id(&args.laborer_id))
}

pub async fn get_laborers_by_neighborhood(
    State(state): State<Arc<AppState>>,
    Json(args): Json<NeighborhoodArgs>,
) -> Json<Vec<LaborerProfile>> {
    Json(state.backend.get_laborers_by_neighborhood(&args.neighborhood))
}

pub async fn get_bookables_near_location(
    State(state): State<Arc<AppState>>,
    Json(args): Json<NearLocationArgs>,
) -> Json<Vec<LaborerProfile>> {
    Json(
        state
            .backend
            .get_bookables_near_location(&args.location, args.radius),
    )
}

// ── Bookings ──

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(input): Json<BookingInput>,
) -> Json<BookingResponse> {
    Json(state.backend.create_booking(&caller(&headers), input))
}

pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(args): Json<BookingStatusArgs>,
) -> Result<Json<()>, ClientError> {
    state
        .backend
        .update_booking_status(&caller(&headers), args.booking_id, args.status)?;
    Ok(Json(()))
}

pub async fn update_booking_details(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(args): Json<BookingDetailsArgs>,
) -> Result<Json<()>, ClientError> {
    state
        .backend
        .update_booking_details(&caller(&headers), args.booking_id, args.details)?;
    Ok(Json(()))
}

// ── Roles ──

pub async fn assign_caller_user_role(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(args): Json<AssignRoleArgs>,
) -> Result<Json<()>, ClientError> {
    state
        .backend
        .assign_caller_user_role(&caller(&headers), args.user, args.role)?;
    Ok(Json(()))
}

pub async fn get_caller_user_role(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<UserRole> {
    Json(state.backend.get_caller_user_role(&caller(&headers)))
}

pub async fn is_caller_admin(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<bool> {
    Json(state.backend.is_caller_admin(&caller(&headers)))
}
