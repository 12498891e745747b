pub mod http;
pub mod memory;
pub mod wire;

use async_trait::async_trait;

use crate::errors::ClientError;
use crate::models::{
    BookingId, BookingInput, BookingResponse, BookingStatus, LaborerInput, LaborerProfile,
    Principal, UserProfile, UserRole,
};

/// Remote backend bound to one caller identity.
#[async_trait]
pub trait BackendActor: Send + Sync {
    fn principal(&self) -> Principal;

    async fn get_caller_user_profile(&self) -> Result<Option<UserProfile>, ClientError>;
    async fn save_caller_user_profile(&self, profile: &UserProfile) -> Result<(), ClientError>;
    async fn get_user_profile(&self, user: &Principal) -> Result<Option<UserProfile>, ClientError>;

    async fn get_caller_laborer(&self) -> Result<Option<LaborerProfile>, ClientError>;
    async fn save_caller_laborer(&self, input: &LaborerInput) -> Result<(), ClientError>;
    async fn get_laborer_by_id(&self, id: &Principal)
        -> Result<Option<LaborerProfile>, ClientError>;
    async fn get_laborers_by_neighborhood(
        &self,
        neighborhood: &str,
    ) -> Result<Vec<LaborerProfile>, ClientError>;
    async fn get_bookables_near_location(
        &self,
        location: &str,
        radius: u64,
    ) -> Result<Vec<LaborerProfile>, ClientError>;

    async fn create_booking(&self, input: &BookingInput) -> Result<BookingResponse, ClientError>;
    async fn update_booking_status(
        &self,
        id: BookingId,
        status: BookingStatus,
    ) -> Result<(), ClientError>;
    async fn update_booking_details(&self, id: BookingId, details: &str)
        -> Result<(), ClientError>;

    async fn assign_caller_user_role(
        &self,
        user: &Principal,
        role: UserRole,
    ) -> Result<(), ClientError>;
    async fn get_caller_user_role(&self) -> Result<UserRole, ClientError>;
    async fn is_caller_admin(&self) -> Result<bool, ClientError>;
}
