use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::BackendActor;
use crate::errors::ClientError;
use crate::models::{
    Booking, BookingId, BookingInput, BookingResponse, BookingStatus, LaborerInput,
    LaborerProfile, Principal, UserProfile, UserRole,
};
use crate::services::lifecycle::authorize_transition;

#[derive(Default)]
struct Store {
    profiles: HashMap<Principal, UserProfile>,
    laborers: BTreeMap<Principal, LaborerInput>,
    bookings: BTreeMap<BookingId, Booking>,
    roles: HashMap<Principal, UserRole>,
    next_booking_id: BookingId,
}

impl Store {
    // Bookings are indexed under both parties, so requesters see outgoing ones too.
    fn laborer_profile(&self, id: &Principal) -> Option<LaborerProfile> {
        let input = self.laborers.get(id)?.clone();
        let bookings = self
            .bookings
            .values()
            .filter(|b| b.involves(id))
            .cloned()
            .collect();
        Some(LaborerProfile::from_input(id.clone(), input, bookings))
    }

    fn laborers_where<F>(&self, mut predicate: F) -> Vec<LaborerProfile>
    where
        F: FnMut(&LaborerInput) -> bool,
    {
        self.laborers
            .iter()
            .filter(|(_, input)| predicate(input))
            .filter_map(|(id, _)| self.laborer_profile(id))
            .collect()
    }
}

/// In-process reference backend. Backs the dev replica server and tests.
pub struct MemoryBackend {
    store: Mutex<Store>,
    admins: Vec<Principal>,
}

impl MemoryBackend {
    pub fn new(admins: Vec<Principal>) -> Self {
        Self {
            store: Mutex::new(Store {
                next_booking_id: 1,
                ..Store::default()
            }),
            admins,
        }
    }

    pub fn actor(self: &Arc<Self>, caller: Principal) -> MemoryActor {
        MemoryActor {
            backend: Arc::clone(self),
            caller,
        }
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Profiles ──

    pub fn get_caller_user_profile(&self, caller: &Principal) -> Option<UserProfile> {
        self.store().profiles.get(caller).cloned()
    }

    pub fn save_caller_user_profile(
        &self,
        caller: &Principal,
        profile: UserProfile,
    ) -> Result<(), ClientError> {
        require_identity(caller)?;
        if profile.name.trim().is_empty() {
            return Err(ClientError::InvalidFields("name is required".to_string()));
        }
        self.store().profiles.insert(caller.clone(), profile);
        tracing::info!(caller = %caller, "saved user profile");
        Ok(())
    }

    pub fn get_user_profile(&self, user: &Principal) -> Option<UserProfile> {
        self.store().profiles.get(user).cloned()
    }

    // ── Laborers ──

    pub fn get_caller_laborer(&self, caller: &Principal) -> Option<LaborerProfile> {
        self.store().laborer_profile(caller)
    }

    pub fn save_caller_laborer(
        &self,
        caller: &Principal,
        input: LaborerInput,
    ) -> Result<(), ClientError> {
        require_identity(caller)?;
        if input.name.trim().is_empty() || input.location.trim().is_empty() {
            return Err(ClientError::InvalidFields(
                "name and location are required".to_string(),
            ));
        }
        self.store().laborers.insert(caller.clone(), input);
        tracing::info!(caller = %caller, "saved laborer profile");
        Ok(())
    }

    pub fn get_laborer_by_id(&self, id: &Principal) -> Option<LaborerProfile> {
        self.store().laborer_profile(id)
    }

    pub fn get_laborers_by_neighborhood(&self, neighborhood: &str) -> Vec<LaborerProfile> {
        let wanted = neighborhood.trim();
        self.store()
            .laborers_where(|l| l.location.trim().eq_ignore_ascii_case(wanted))
    }

    /// Location matching is textual: there are no coordinates, so `radius`
    /// does not narrow the result. Only laborers who can take work are listed;
    /// an empty location lists all of them.
    pub fn get_bookables_near_location(&self, location: &str, _radius: u64) -> Vec<LaborerProfile> {
        let wanted = location.trim().to_lowercase();
        self.store()
            .laborers_where(|l| {
                l.availability.is_bookable()
                    && (wanted.is_empty() || l.location.to_lowercase().contains(&wanted))
            })
    }

    // ── Bookings ──

    pub fn create_booking(&self, caller: &Principal, input: BookingInput) -> BookingResponse {
        if caller.is_anonymous() || caller == &input.target_laborer {
            return BookingResponse::CallerNotAuthorizedToBook;
        }
        if input.validate().is_err() {
            return BookingResponse::InvalidFieldValues;
        }

        let mut store = self.store();
        if !store.laborers.contains_key(&input.target_laborer) {
            return BookingResponse::LaborerNotFound;
        }

        let id = store.next_booking_id;
        store.next_booking_id += 1;
        store.bookings.insert(
            id,
            Booking {
                id,
                status: BookingStatus::Pending,
                service_type: input.service_type,
                requester: caller.clone(),
                target_laborer: input.target_laborer,
                duration_hours: input.duration_hours,
                details: input.details,
                date_time: input.date_time,
                location: input.location,
            },
        );
        tracing::info!(booking_id = id, requester = %caller, "booking created");
        BookingResponse::Ok(id)
    }

    pub fn update_booking_status(
        &self,
        caller: &Principal,
        id: BookingId,
        status: BookingStatus,
    ) -> Result<(), ClientError> {
        let mut store = self.store();
        let booking = store
            .bookings
            .get_mut(&id)
            .ok_or_else(|| ClientError::NotFound(format!("booking {id}")))?;
        authorize_transition(booking, caller, status)?;

        tracing::info!(booking_id = id, from = %booking.status, to = %status, "booking status updated");
        booking.status = status;
        Ok(())
    }

    pub fn update_booking_details(
        &self,
        caller: &Principal,
        id: BookingId,
        details: String,
    ) -> Result<(), ClientError> {
        if details.trim().is_empty() {
            return Err(ClientError::InvalidFields(
                "details cannot be empty".to_string(),
            ));
        }
        let mut store = self.store();
        let booking = store
            .bookings
            .get_mut(&id)
            .ok_or_else(|| ClientError::NotFound(format!("booking {id}")))?;
        if &booking.target_laborer != caller {
            return Err(ClientError::Unauthorized(
                "only the laborer can edit booking details".to_string(),
            ));
        }
        booking.details = Some(details);
        Ok(())
    }

    // ── Roles ──

    pub fn get_caller_user_role(&self, caller: &Principal) -> UserRole {
        if self.admins.contains(caller) {
            return UserRole::Admin;
        }
        let store = self.store();
        if let Some(role) = store.roles.get(caller) {
            return *role;
        }
        if store.profiles.contains_key(caller) {
            UserRole::User
        } else {
            UserRole::Guest
        }
    }

    pub fn assign_caller_user_role(
        &self,
        caller: &Principal,
        user: Principal,
        role: UserRole,
    ) -> Result<(), ClientError> {
        if self.get_caller_user_role(caller) != UserRole::Admin {
            return Err(ClientError::Unauthorized(
                "only admins can assign roles".to_string(),
            ));
        }
        tracing::info!(user = %user, role = role.as_str(), "role assigned");
        self.store().roles.insert(user, role);
        Ok(())
    }

    pub fn is_caller_admin(&self, caller: &Principal) -> bool {
        self.get_caller_user_role(caller) == UserRole::Admin
    }
}

fn require_identity(caller: &Principal) -> Result<(), ClientError> {
    if caller.is_anonymous() {
        return Err(ClientError::Unauthorized(
            "anonymous callers cannot do that".to_string(),
        ));
    }
    Ok(())
}

pub struct MemoryActor {
    backend: Arc<MemoryBackend>,
    caller: Principal,
}

#[async_trait]
impl BackendActor for MemoryActor {
    fn principal(&self) -> Principal {
        self.caller.clone()
    }

    async fn get_caller_user_profile(&self) -> Result<Option<UserProfile>, ClientError> {
        Ok(self.backend.get_caller_user_profile(&self.caller))
    }

    async fn save_caller_user_profile(&self, profile: &UserProfile) -> Result<(), ClientError> {
        self.backend
            .save_caller_user_profile(&self.caller, profile.clone())
    }

    async fn get_user_profile(&self, user: &Principal) -> Result<Option<UserProfile>, ClientError> {
        Ok(self.backend.get_user_profile(user))
    }

    async fn get_caller_laborer(&self) -> Result<Option<LaborerProfile>, ClientError> {
        Ok(self.backend.get_caller_laborer(&self.caller))
    }

    async fn save_caller_laborer(&self, input: &LaborerInput) -> Result<(), ClientError> {
        self.backend.save_caller_laborer(&self.caller, input.clone())
    }

    async fn get_laborer_by_id(
        &self,
        id: &Principal,
    ) -> Result<Option<LaborerProfile>, ClientError> {
        Ok(self.backend.get_laborer_by_id(id))
    }

    async fn get_laborers_by_neighborhood(
        &self,
        neighborhood: &str,
    ) -> Result<Vec<LaborerProfile>, ClientError> {
        Ok(self.backend.get_laborers_by_neighborhood(neighborhood))
    }

    async fn get_bookables_near_location(
        &self,
        location: &str,
        radius: u64,
    ) -> Result<Vec<LaborerProfile>, ClientError> {
        Ok(self.backend.get_bookables_near_location(location, radius))
    }

    async fn create_booking(&self, input: &BookingInput) -> Result<BookingResponse, ClientError> {
        Ok(self.backend.create_booking(&self.caller, input.clone()))
    }

    async fn update_booking_status(
        &self,
        id: BookingId,
        status: BookingStatus,
    ) -> Result<(), ClientError> {
        self.backend.update_booking_status(&self.caller, id, status)
    }

    async fn update_booking_details(
        &self,
        id: BookingId,
        details: &str,
    ) -> Result<(), ClientError> {
        self.backend
            .update_booking_details(&self.caller, id, details.to_string())
    }

    async fn assign_caller_user_role(
        &self,
        user: &Principal,
        role: UserRole,
    ) -> Result<(), ClientError> {
        self.backend
            .assign_caller_user_role(&self.caller, user.clone(), role)
    }

    async fn get_caller_user_role(&self) -> Result<UserRole, ClientError> {
        Ok(self.backend.get_caller_user_role(&self.caller))
    }

    async fn is_caller_admin(&self) -> Result<bool, ClientError> {
        Ok(self.backend.is_caller_admin(&self.caller))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Availability, AvailabilityStatus};

    fn laborer_input(name: &str, location: &str) -> LaborerInput {
        LaborerInput {
            name: name.to_string(),
            contact: format!("{}@example.com", name.to_lowercase()),
            mobile_number: "555-0100".to_string(),
            location: location.to_string(),
            skills: ["plumbing".to_string()].into_iter().collect(),
            services: vec![],
            availability: Availability::new(AvailabilityStatus::Available, 0),
        }
    }

    fn booking_input(target: &Principal, duration_hours: u64) -> BookingInput {
        BookingInput {
            service_type: "Plumbing".to_string(),
            target_laborer: target.clone(),
            duration_hours,
            details: None,
            date_time: 1_750_000_000_000_000_000,
            location: "Downtown".to_string(),
        }
    }

    fn setup() -> (MemoryBackend, Principal, Principal) {
        let backend = MemoryBackend::new(vec![]);
        let a = Principal::from_text("requester-a");
        let b = Principal::from_text("laborer-b");
        backend
            .save_caller_laborer(&b, laborer_input("Bea", "Downtown"))
            .unwrap();
        (backend, a, b)
    }

    #[test]
    fn test_create_booking_assigns_sequential_ids() {
        let (backend, a, b) = setup();
        assert_eq!(backend.create_booking(&a, booking_input(&b, 2)), BookingResponse::Ok(1));
        assert_eq!(backend.create_booking(&a, booking_input(&b, 3)), BookingResponse::Ok(2));

        let laborer = backend.get_laborer_by_id(&b).unwrap();
        assert_eq!(laborer.bookings.len(), 2);
        assert!(laborer.bookings.iter().all(|bk| bk.status == BookingStatus::Pending));
    }

    #[test]
    fn test_create_booking_rejections() {
        let (backend, a, b) = setup();
        assert_eq!(
            backend.create_booking(&a, booking_input(&b, 0)),
            BookingResponse::InvalidFieldValues
        );
        assert_eq!(
            backend.create_booking(&a, booking_input(&Principal::from_text("ghost"), 1)),
            BookingResponse::LaborerNotFound
        );
        assert_eq!(
            backend.create_booking(&Principal::anonymous(), booking_input(&b, 1)),
            BookingResponse::CallerNotAuthorizedToBook
        );
        assert_eq!(
            backend.create_booking(&b, booking_input(&b, 1)),
            BookingResponse::CallerNotAuthorizedToBook
        );
    }

    #[test]
    fn test_requester_with_laborer_record_sees_outgoing_booking() {
        let (backend, a, b) = setup();
        backend
            .save_caller_laborer(&a, laborer_input("Abe", "Westside"))
            .unwrap();
        backend.create_booking(&a, booking_input(&b, 2));

        let mine = backend.get_caller_laborer(&a).unwrap();
        assert_eq!(mine.bookings.len(), 1);
        assert_eq!(mine.bookings[0].requester, a);
    }

    #[test]
    fn test_status_update_rules() {
        let (backend, a, b) = setup();
        backend.create_booking(&a, booking_input(&b, 2));

        let err = backend
            .update_booking_status(&a, 1, BookingStatus::Confirmed)
            .unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized(_)));

        backend
            .update_booking_status(&b, 1, BookingStatus::Confirmed)
            .unwrap();
        backend
            .update_booking_status(&b, 1, BookingStatus::Completed)
            .unwrap();
        let err = backend
            .update_booking_status(&b, 1, BookingStatus::Cancelled)
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidTransition { .. }));

        let err = backend
            .update_booking_status(&b, 99, BookingStatus::Confirmed)
            .unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[test]
    fn test_only_laborer_edits_details() {
        let (backend, a, b) = setup();
        backend.create_booking(&a, booking_input(&b, 2));
        for caller in [Principal::from_text("mallory"), a.clone()] {
            let err = backend
                .update_booking_details(&caller, 1, "gate code 1234".into())
                .unwrap_err();
            assert!(matches!(err, ClientError::Unauthorized(_)));
        }

        for blank in ["", "   "] {
            let err = backend
                .update_booking_details(&b, 1, blank.into())
                .unwrap_err();
            assert!(matches!(err, ClientError::InvalidFields(_)));
        }

        backend
            .update_booking_details(&b, 1, "gate code 1234".into())
            .unwrap();
        let booking = backend.get_laborer_by_id(&b).unwrap().bookings.remove(0);
        assert_eq!(booking.details.as_deref(), Some("gate code 1234"));
    }

    #[test]
    fn test_location_queries() {
        let (backend, _, b) = setup();
        let w = Principal::from_text("laborer-w");
        backend
            .save_caller_laborer(&w, laborer_input("Wes", "Westside"))
            .unwrap();

        let downtown = backend.get_laborers_by_neighborhood("downtown");
        assert_eq!(downtown.len(), 1);
        assert_eq!(downtown[0].id, b);

        assert_eq!(backend.get_bookables_near_location("west", 10).len(), 1);
        assert_eq!(backend.get_bookables_near_location("", 100).len(), 2);

        let mut resting = laborer_input("Una", "Westside");
        resting.availability = Availability::new(AvailabilityStatus::Unavailable, 0);
        backend
            .save_caller_laborer(&Principal::from_text("laborer-u"), resting)
            .unwrap();
        assert_eq!(backend.get_laborers_by_neighborhood("Westside").len(), 2);
        let bookable = backend.get_bookables_near_location("west", 10);
        assert_eq!(bookable.len(), 1);
        assert_eq!(bookable[0].id, w);
    }

    #[test]
    fn test_roles() {
        let admin = Principal::from_text("admin-1");
        let backend = MemoryBackend::new(vec![admin.clone()]);
        let user = Principal::from_text("user-1");

        assert_eq!(backend.get_caller_user_role(&user), UserRole::Guest);
        backend
            .save_caller_user_profile(&user, UserProfile { name: "Uma".into() })
            .unwrap();
        assert_eq!(backend.get_caller_user_role(&user), UserRole::User);

        let err = backend
            .assign_caller_user_role(&user, user.clone(), UserRole::Admin)
            .unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized(_)));

        backend
            .assign_caller_user_role(&admin, user.clone(), UserRole::Admin)
            .unwrap();
        assert!(backend.is_caller_admin(&user));
    }

    #[test]
    fn test_anonymous_cannot_save_profile() {
        let backend = MemoryBackend::new(vec![]);
        let err = backend
            .save_caller_user_profile(&Principal::anonymous(), UserProfile { name: "X".into() })
            .unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized(_)));
    }
}
