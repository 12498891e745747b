use crate::errors::ClientError;
use crate::models::{Booking, BookingId, BookingStatus, Principal};
use crate::services::queries::LaborClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingRole {
    Requester,
    Provider,
}

impl BookingRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingRole::Requester => "requester",
            BookingRole::Provider => "laborer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingAction {
    Accept,
    Decline,
    Withdraw,
    Complete,
}

impl BookingAction {
    pub const ALL: [BookingAction; 4] = [
        BookingAction::Accept,
        BookingAction::Decline,
        BookingAction::Withdraw,
        BookingAction::Complete,
    ];

    /// (who may act, from, to). A confirmed booking has no cancellation path.
    pub fn rule(&self) -> (BookingRole, BookingStatus, BookingStatus) {
        match self {
            BookingAction::Accept => (
                BookingRole::Provider,
                BookingStatus::Pending,
                BookingStatus::Confirmed,
            ),
            BookingAction::Decline => (
                BookingRole::Provider,
                BookingStatus::Pending,
                BookingStatus::Cancelled,
            ),
            BookingAction::Withdraw => (
                BookingRole::Requester,
                BookingStatus::Pending,
                BookingStatus::Cancelled,
            ),
            BookingAction::Complete => (
                BookingRole::Provider,
                BookingStatus::Confirmed,
                BookingStatus::Completed,
            ),
        }
    }

    pub fn target_status(&self) -> BookingStatus {
        self.rule().2
    }

    pub fn label(&self) -> &'static str {
        match self {
            BookingAction::Accept => "Confirm",
            BookingAction::Decline => "Decline",
            BookingAction::Withdraw => "Cancel Booking",
            BookingAction::Complete => "Mark as Completed",
        }
    }
}

pub fn roles_of(booking: &Booking, caller: &Principal) -> Vec<BookingRole> {
    let mut roles = vec![];
    if &booking.target_laborer == caller {
        roles.push(BookingRole::Provider);
    }
    if &booking.requester == caller {
        roles.push(BookingRole::Requester);
    }
    roles
}

/// Decides whether `caller` may move `booking` to `to`, and as which action.
/// Runs before any remote call; the backend applies the same rules.
pub fn authorize_transition(
    booking: &Booking,
    caller: &Principal,
    to: BookingStatus,
) -> Result<BookingAction, ClientError> {
    let roles = roles_of(booking, caller);
    if roles.is_empty() {
        return Err(ClientError::Unauthorized(
            "only the requester or the laborer can change this booking".to_string(),
        ));
    }

    let from = booking.status;
    if from.is_terminal() {
        return Err(ClientError::InvalidTransition { from, to });
    }

    let candidates: Vec<BookingAction> = BookingAction::ALL
        .into_iter()
        .filter(|action| {
            let (_, rule_from, rule_to) = action.rule();
            rule_from == from && rule_to == to
        })
        .collect();
    if candidates.is_empty() {
        return Err(ClientError::InvalidTransition { from, to });
    }

    candidates
        .iter()
        .copied()
        .find(|action| roles.contains(&action.rule().0))
        .ok_or_else(|| {
            ClientError::Unauthorized(format!(
                "the {} cannot mark a {from} booking {to}",
                roles[0].as_str()
            ))
        })
}

pub fn authorize_action(
    booking: &Booking,
    caller: &Principal,
    action: BookingAction,
) -> Result<(), ClientError> {
    let (role, from, to) = action.rule();
    let roles = roles_of(booking, caller);
    if !roles.contains(&role) {
        return Err(ClientError::Unauthorized(format!(
            "only the {} can {}",
            role.as_str(),
            action.label().to_lowercase()
        )));
    }
    if booking.status != from {
        return Err(ClientError::InvalidTransition {
            from: booking.status,
            to,
        });
    }
    Ok(())
}

pub fn available_actions(booking: &Booking, caller: &Principal) -> Vec<BookingAction> {
    BookingAction::ALL
        .into_iter()
        .filter(|action| authorize_action(booking, caller, *action).is_ok())
        .collect()
}

/// Gatekeeper for booking changes made through a [`LaborClient`].
pub struct BookingLifecycle<'a> {
    client: &'a LaborClient,
}

impl<'a> BookingLifecycle<'a> {
    pub fn new(client: &'a LaborClient) -> Self {
        Self { client }
    }

    pub async fn transition(
        &self,
        booking_id: BookingId,
        to: BookingStatus,
    ) -> Result<Booking, ClientError> {
        let (caller, booking) = self.load(booking_id).await?;
        let action = authorize_transition(&booking, &caller, to)?;
        self.apply(booking, action).await
    }

    /// Transition for a booking the caller already holds, such as one listed
    /// on a laborer's public profile.
    pub async fn transition_booking(
        &self,
        booking: &Booking,
        to: BookingStatus,
    ) -> Result<Booking, ClientError> {
        let caller = self
            .client
            .session()
            .identity()
            .ok_or(ClientError::NotReady)?;
        let action = authorize_transition(booking, &caller, to)?;
        self.apply(booking.clone(), action).await
    }

    pub async fn perform(
        &self,
        booking_id: BookingId,
        action: BookingAction,
    ) -> Result<Booking, ClientError> {
        let (caller, booking) = self.load(booking_id).await?;
        authorize_action(&booking, &caller, action)?;
        self.apply(booking, action).await
    }

    pub async fn accept(&self, booking_id: BookingId) -> Result<Booking, ClientError> {
        self.perform(booking_id, BookingAction::Accept).await
    }

    pub async fn decline(&self, booking_id: BookingId) -> Result<Booking, ClientError> {
        self.perform(booking_id, BookingAction::Decline).await
    }

    pub async fn withdraw(&self, booking_id: BookingId) -> Result<Booking, ClientError> {
        self.perform(booking_id, BookingAction::Withdraw).await
    }

    pub async fn complete(&self, booking_id: BookingId) -> Result<Booking, ClientError> {
        self.perform(booking_id, BookingAction::Complete).await
    }

    /// Only the laborer edits booking notes.
    pub async fn update_details(
        &self,
        booking_id: BookingId,
        details: &str,
    ) -> Result<(), ClientError> {
        if details.trim().is_empty() {
            return Err(ClientError::InvalidFields(
                "details cannot be empty".to_string(),
            ));
        }
        let (caller, booking) = self.load(booking_id).await?;
        if booking.target_laborer != caller {
            return Err(ClientError::Unauthorized(
                "only the laborer can edit booking details".to_string(),
            ));
        }
        self.client
            .update_booking_details(booking_id, details)
            .await
    }

    async fn load(&self, booking_id: BookingId) -> Result<(Principal, Booking), ClientError> {
        let caller = self.client.session().identity().ok_or(ClientError::NotReady)?;
        let booking = self
            .client
            .get_booking_by_id(booking_id)
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("booking {booking_id}")))?;
        Ok((caller, booking))
    }

    async fn apply(&self, booking: Booking, action: BookingAction) -> Result<Booking, ClientError> {
        let to = action.target_status();
        tracing::info!(
            booking_id = booking.id,
            action = ?action,
            from = %booking.status,
            to = %to,
            "applying booking transition"
        );
        self.client.update_booking_status(booking.id, to).await?;
        Ok(Booking {
            status: to,
            ..booking
        })
    }
}
