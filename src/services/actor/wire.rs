use serde::{Deserialize, Serialize};

use crate::models::{BookingId, BookingStatus, Principal, UserRole};

pub const CALLER_HEADER: &str = "x-caller-principal";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserArgs {
    pub user: Principal,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaborerIdArgs {
    pub laborer_id: Principal,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodArgs {
    pub neighborhood: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearLocationArgs {
    pub location: String,
    pub radius: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingStatusArgs {
    pub booking_id: BookingId,
    pub status: BookingStatus,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetailsArgs {
    pub booking_id: BookingId,
    pub details: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoleArgs {
    pub user: Principal,
    pub role: UserRole,
}
