use std::future::Future;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::errors::ClientError;
use crate::models::{
    Booking, BookingForm, BookingId, BookingInput, BookingStatus, LaborerInput, LaborerProfile,
    Principal, UserProfile, UserRole,
};
use crate::services::actor::BackendActor;
use crate::services::filters::{partition, BookingsOverview};
use crate::services::query_cache::{QueryCache, QueryKey, QueryOptions};
use crate::services::retry::RetryPolicy;
use crate::services::session::Session;

pub mod keys {
    use super::QueryKey;
    use crate::models::{BookingId, Principal};

    pub fn caller_user_profile() -> QueryKey {
        QueryKey::new(["currentUserProfile"])
    }

    pub fn user_profile(user: &Principal) -> QueryKey {
        QueryKey::new(["userProfile", user.as_str()])
    }

    pub fn caller_laborer() -> QueryKey {
        QueryKey::new(["callerLaborer"])
    }

    /// Prefix of every laborer listing and lookup.
    pub fn laborers() -> QueryKey {
        QueryKey::new(["laborers"])
    }

    pub fn laborer(id: &Principal) -> QueryKey {
        QueryKey::new(["laborers", "id", id.as_str()])
    }

    pub fn laborers_by_neighborhood(neighborhood: &str) -> QueryKey {
        QueryKey::new(["laborers", "neighborhood", neighborhood])
    }

    pub fn bookables_near_location(location: &str, radius: u64) -> QueryKey {
        QueryKey::new([
            "laborers".to_string(),
            "location".to_string(),
            location.to_string(),
            radius.to_string(),
        ])
    }

    pub fn bookings() -> QueryKey {
        QueryKey::new(["bookings"])
    }

    /// Prefix of every single-booking view.
    pub fn all_bookings() -> QueryKey {
        QueryKey::new(["booking"])
    }

    pub fn booking(id: BookingId) -> QueryKey {
        QueryKey::new(["booking".to_string(), id.to_string()])
    }

    pub fn caller_user_role() -> QueryKey {
        QueryKey::new(["callerUserRole"])
    }

    pub fn is_caller_admin() -> QueryKey {
        QueryKey::new(["isCallerAdmin"])
    }
}

/// Views that can contain a booking. `booking` narrows the single-booking view.
fn booking_views(booking: QueryKey) -> [QueryKey; 4] {
    [keys::caller_laborer(), keys::laborers(), keys::bookings(), booking]
}

/// Cached access to the backend actor for one signed-in user.
pub struct LaborClient {
    session: Session,
    cache: Arc<QueryCache>,
    config: AppConfig,
}

impl LaborClient {
    pub fn new(config: AppConfig) -> Self {
        Self::with_cache(config, Arc::new(QueryCache::new()))
    }

    pub fn with_cache(config: AppConfig, cache: Arc<QueryCache>) -> Self {
        Self {
            session: Session::new(),
            cache,
            config,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn connect(&self, actor: Arc<dyn BackendActor>) {
        self.session.connect(actor);
    }

    pub fn logout(&self) {
        self.session.disconnect();
        self.cache.clear();
    }

    // ── Profiles ──

    /// Not retried: the answer decides whether profile setup is shown.
    pub async fn get_caller_user_profile(&self) -> Result<Option<UserProfile>, ClientError> {
        self.query(
            keys::caller_user_profile(),
            true,
            RetryPolicy::none(),
            |actor| async move { actor.get_caller_user_profile().await },
        )
        .await
    }

    /// True once the profile query has completed for a signed-in caller and
    /// found nothing.
    pub fn needs_profile_setup(&self) -> bool {
        if self.session.identity().is_none() {
            return false;
        }
        let state = self
            .cache
            .state::<Option<UserProfile>>(&keys::caller_user_profile());
        state.is_fetched && state.error.is_none() && matches!(state.data.as_deref(), Some(None))
    }

    pub async fn save_caller_user_profile(&self, profile: &UserProfile) -> Result<(), ClientError> {
        if profile.name.trim().is_empty() {
            return Err(ClientError::InvalidFields("name is required".to_string()));
        }
        let profile = profile.clone();
        self.mutate("saveCallerUserProfile", |actor| async move {
            actor.save_caller_user_profile(&profile).await
        })
        .await?;
        self.cache
            .invalidate(&[keys::caller_user_profile(), keys::caller_user_role()]);
        Ok(())
    }

    pub async fn get_user_profile(&self, user: &Principal) -> Result<Option<UserProfile>, ClientError> {
        let user = user.clone();
        self.query(
            keys::user_profile(&user),
            true,
            self.config.retry.clone(),
            move |actor| {
                let user = user.clone();
                async move { actor.get_user_profile(&user).await }
            },
        )
        .await
    }

    // ── Laborers ──

    pub async fn get_caller_laborer(&self) -> Result<Option<LaborerProfile>, ClientError> {
        self.query(
            keys::caller_laborer(),
            true,
            self.config.retry.clone(),
            |actor| async move { actor.get_caller_laborer().await },
        )
        .await
    }

    pub async fn save_caller_laborer(&self, input: &LaborerInput) -> Result<(), ClientError> {
        let input = input.clone();
        self.mutate("saveCallerLaborer", |actor| async move {
            actor.save_caller_laborer(&input).await
        })
        .await?;
        self.cache
            .invalidate(&[keys::caller_laborer(), keys::laborers()]);
        Ok(())
    }

    pub async fn get_laborer_by_id(&self, id: &Principal) -> Result<Option<LaborerProfile>, ClientError> {
        let id = id.clone();
        self.query(
            keys::laborer(&id),
            true,
            self.config.retry.clone(),
            move |actor| {
                let id = id.clone();
                async move { actor.get_laborer_by_id(&id).await }
            },
        )
        .await
    }

    pub async fn get_laborers_by_neighborhood(
        &self,
        neighborhood: &str,
    ) -> Result<Vec<LaborerProfile>, ClientError> {
        let neighborhood = neighborhood.to_string();
        self.query(
            keys::laborers_by_neighborhood(&neighborhood),
            !neighborhood.is_empty(),
            self.config.retry.clone(),
            move |actor| {
                let neighborhood = neighborhood.clone();
                async move { actor.get_laborers_by_neighborhood(&neighborhood).await }
            },
        )
        .await
    }

    pub async fn get_bookables_near_location(
        &self,
        location: &str,
        radius: u64,
    ) -> Result<Vec<LaborerProfile>, ClientError> {
        let location = location.to_string();
        self.query(
            keys::bookables_near_location(&location, radius),
            !location.is_empty(),
            self.config.retry.clone(),
            move |actor| {
                let location = location.clone();
                async move { actor.get_bookables_near_location(&location, radius).await }
            },
        )
        .await
    }

    // ── Bookings ──

    /// Resolved from the caller's own record; the backend has no direct lookup.
    pub async fn get_booking_by_id(&self, id: BookingId) -> Result<Option<Booking>, ClientError> {
        self.query(
            keys::booking(id),
            true,
            self.config.retry.clone(),
            move |actor| async move {
                let laborer = actor.get_caller_laborer().await?;
                Ok(laborer.and_then(|l| l.booking(id).cloned()))
            },
        )
        .await
    }

    pub async fn get_bookings(&self) -> Result<BookingsOverview, ClientError> {
        self.query(
            keys::bookings(),
            true,
            self.config.retry.clone(),
            |actor| async move {
                let caller = actor.principal();
                let laborer = actor.get_caller_laborer().await?;
                Ok(laborer
                    .map(|l| partition(&l.bookings, &caller))
                    .unwrap_or_default())
            },
        )
        .await
    }

    /// Validates locally, then calls the backend under a hard client-side
    /// timeout. A timed-out call is reported as `Timeout` even if the backend
    /// finishes later, and is never retried.
    pub async fn create_booking(&self, input: &BookingInput) -> Result<BookingId, ClientError> {
        input.validate()?;
        let actor = self.session.actor().ok_or(ClientError::NotReady)?;

        let timeout = self.config.create_booking_timeout;
        let response = match tokio::time::timeout(timeout, actor.create_booking(input)).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    target_laborer = %input.target_laborer,
                    timeout_secs = timeout.as_secs(),
                    "create booking timed out"
                );
                return Err(ClientError::Timeout(timeout));
            }
        };
        let id = response.into_result().inspect_err(|e| {
            tracing::warn!(target_laborer = %input.target_laborer, error = %e, "booking rejected");
        })?;
        tracing::info!(booking_id = id, target_laborer = %input.target_laborer, "booking created");

        let views = booking_views(keys::all_bookings());
        self.cache.invalidate(&views);
        // The backend can lag behind its own write; refetch once more after it settles.
        tokio::time::sleep(self.config.settle_delay).await;
        self.cache.invalidate(&views);
        Ok(id)
    }

    /// Borrows the form so its contents survive any failure.
    pub async fn submit_booking(
        &self,
        form: &BookingForm,
        target_laborer: &Principal,
    ) -> Result<BookingId, ClientError> {
        let input = form.to_input(target_laborer)?;
        self.create_booking(&input).await
    }

    pub async fn update_booking_status(
        &self,
        id: BookingId,
        status: BookingStatus,
    ) -> Result<(), ClientError> {
        self.mutate("updateBookingStatus", |actor| async move {
            actor.update_booking_status(id, status).await
        })
        .await?;
        self.cache.invalidate(&booking_views(keys::booking(id)));
        Ok(())
    }

    pub async fn update_booking_details(
        &self,
        id: BookingId,
        details: &str,
    ) -> Result<(), ClientError> {
        if details.trim().is_empty() {
            return Err(ClientError::InvalidFields(
                "details cannot be empty".to_string(),
            ));
        }
        let details = details.to_string();
        self.mutate("updateBookingDetails", |actor| async move {
            actor.update_booking_details(id, &details).await
        })
        .await?;
        self.cache.invalidate(&booking_views(keys::booking(id)));
        Ok(())
    }

    // ── Roles ──

    pub async fn get_caller_user_role(&self) -> Result<UserRole, ClientError> {
        self.query(
            keys::caller_user_role(),
            true,
            self.config.retry.clone(),
            |actor| async move { actor.get_caller_user_role().await },
        )
        .await
    }

    pub async fn is_caller_admin(&self) -> Result<bool, ClientError> {
        self.query(
            keys::is_caller_admin(),
            true,
            self.config.retry.clone(),
            |actor| async move { actor.is_caller_admin().await },
        )
        .await
    }

    pub async fn assign_caller_user_role(
        &self,
        user: &Principal,
        role: UserRole,
    ) -> Result<(), ClientError> {
        let user = user.clone();
        self.mutate("assignCallerUserRole", |actor| async move {
            actor.assign_caller_user_role(&user, role).await
        })
        .await?;
        self.cache
            .invalidate(&[keys::caller_user_role(), keys::is_caller_admin()]);
        Ok(())
    }

    // ── Plumbing ──

    async fn query<T, F, Fut>(
        &self,
        key: QueryKey,
        enabled: bool,
        retry: RetryPolicy,
        call: F,
    ) -> Result<T, ClientError>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(Arc<dyn BackendActor>) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let actor = self.session.actor();
        let options = QueryOptions {
            enabled: enabled && actor.is_some(),
            retry,
            stale_time: self.config.stale_time,
        };

        let value = self
            .cache
            .fetch(key, &options, || {
                let pending = actor.clone().map(&call);
                async move {
                    match pending {
                        Some(fut) => fut.await,
                        None => Err(ClientError::NotReady),
                    }
                }
            })
            .await?;
        Ok(T::clone(&value))
    }

    async fn mutate<T, F, Fut>(&self, operation: &str, call: F) -> Result<T, ClientError>
    where
        F: FnOnce(Arc<dyn BackendActor>) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let actor = self.session.actor().ok_or(ClientError::NotReady)?;
        call(actor).await.inspect_err(|e| {
            tracing::warn!(operation, error = %e, "mutation failed");
        })
    }
}
