use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use super::wire::{
    AssignRoleArgs, BookingDetailsArgs, BookingStatusArgs, ErrorBody, LaborerIdArgs,
    NearLocationArgs, NeighborhoodArgs, UserArgs, CALLER_HEADER, REQUEST_ID_HEADER,
};
use super::BackendActor;
use crate::errors::ClientError;
use crate::models::{
    BookingId, BookingInput, BookingResponse, BookingStatus, LaborerInput, LaborerProfile,
    Principal, UserProfile, UserRole,
};

/// Talks to the backend through its HTTP gateway: `POST {base}/rpc/{method}`.
pub struct HttpActor {
    base_url: String,
    caller: Principal,
    client: reqwest::Client,
}

impl HttpActor {
    pub fn new(base_url: impl Into<String>, caller: Principal) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            caller,
            client: reqwest::Client::new(),
        }
    }

    async fn call<A, R>(&self, method: &str, args: &A) -> Result<R, ClientError>
    where
        A: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let request_id = uuid::Uuid::new_v4().to_string();
        let url = format!("{}/rpc/{method}", self.base_url);
        tracing::debug!(method, request_id = %request_id, "calling backend");

        let resp = self
            .client
            .post(&url)
            .header(CALLER_HEADER, self.caller.as_str())
            .header(REQUEST_ID_HEADER, &request_id)
            .json(args)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<ErrorBody>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| status.to_string());
            tracing::warn!(method, request_id = %request_id, %status, "backend call failed");
            return Err(ClientError::from_status(status, message));
        }

        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl BackendActor for HttpActor {
    fn principal(&self) -> Principal {
        self.caller.clone()
    }

    async fn get_caller_user_profile(&self) -> Result<Option<UserProfile>, ClientError> {
        self.call("getCallerUserProfile", &json!({})).await
    }

    async fn save_caller_user_profile(&self, profile: &UserProfile) -> Result<(), ClientError> {
        self.call("saveCallerUserProfile", profile).await
    }

    async fn get_user_profile(&self, user: &Principal) -> Result<Option<UserProfile>, ClientError> {
        let args = UserArgs { user: user.clone() };
        self.call("getUserProfile", &args).await
    }

    async fn get_caller_laborer(&self) -> Result<Option<LaborerProfile>, ClientError> {
        self.call("getCallerLaborer", &json!({})).await
    }

    async fn save_caller_laborer(&self, input: &LaborerInput) -> Result<(), ClientError> {
        self.call("saveCallerLaborer", input).await
    }

    async fn get_laborer_by_id(
        &self,
        id: &Principal,
    ) -> Result<Option<LaborerProfile>, ClientError> {
        let args = LaborerIdArgs {
            laborer_id: id.clone(),
        };
        self.call("getLaborerById", &args).await
    }

    async fn get_laborers_by_neighborhood(
        &self,
        neighborhood: &str,
    ) -> Result<Vec<LaborerProfile>, ClientError> {
        let args = NeighborhoodArgs {
            neighborhood: neighborhood.to_string(),
        };
        self.call("getLaborersByNeighborhood", &args).await
    }

    async fn get_bookables_near_location(
        &self,
        location: &str,
        radius: u64,
    ) -> Result<Vec<LaborerProfile>, ClientError> {
        let args = NearLocationArgs {
            location: location.to_string(),
            radius,
        };
        self.call("getBookablesNearLocation", &args).await
    }

    async fn create_booking(&self, input: &BookingInput) -> Result<BookingResponse, ClientError> {
        self.call("createBooking", input).await
    }

    async fn update_booking_status(
        &self,
        id: BookingId,
        status: BookingStatus,
    ) -> Result<(), ClientError> {
        let args = BookingStatusArgs {
            booking_id: id,
            status,
        };
        self.call("updateBookingStatus", &args).await
    }

    async fn update_booking_details(
        &self,
        id: BookingId,
        details: &str,
    ) -> Result<(), ClientError> {
        let args = BookingDetailsArgs {
            booking_id: id,
            details: details.to_string(),
        };
        self.call("updateBookingDetails", &args).await
    }

    async fn assign_caller_user_role(
        &self,
        user: &Principal,
        role: UserRole,
    ) -> Result<(), ClientError> {
        let args = AssignRoleArgs {
            user: user.clone(),
            role,
        };
        self.call("assignCallerUserRole", &args).await
    }

    async fn get_caller_user_role(&self) -> Result<UserRole, ClientError> {
        self.call("getCallerUserRole", &json!({})).await
    }

    async fn is_caller_admin(&self) -> Result<bool, ClientError> {
        self.call("isCallerAdmin", &json!({})).await
    }
}
