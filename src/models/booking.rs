use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::Principal;
use crate::errors::ClientError;

/// Nanoseconds since the Unix epoch.
pub type Time = i64;

pub type BookingId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub status: BookingStatus,
    pub service_type: String,
    pub requester: Principal,
    pub target_laborer: Principal,
    pub duration_hours: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub date_time: Time,
    pub location: String,
}

impl Booking {
    pub fn involves(&self, principal: &Principal) -> bool {
        &self.requester == principal || &self.target_laborer == principal
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 4] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingInput {
    pub service_type: String,
    pub target_laborer: Principal,
    pub duration_hours: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub date_time: Time,
    pub location: String,
}

impl BookingInput {
    /// Same checks the backend applies before answering `invalidFieldValues`.
    pub fn validate(&self) -> Result<(), ClientError> {
        let mut problems = vec![];
        if self.service_type.trim().is_empty() {
            problems.push("service type is required");
        }
        if self.location.trim().is_empty() {
            problems.push("location is required");
        }
        if self.duration_hours == 0 {
            problems.push("duration must be at least one hour");
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ClientError::InvalidFields(problems.join(", ")))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BookingResponse {
    Ok(BookingId),
    LaborerNotFound,
    CallerNotAuthorizedToBook,
    InvalidFieldValues,
}

impl BookingResponse {
    pub fn into_result(self) -> Result<BookingId, ClientError> {
        match self {
            BookingResponse::Ok(id) => Ok(id),
            BookingResponse::LaborerNotFound => {
                Err(ClientError::NotFound("laborer".to_string()))
            }
            BookingResponse::CallerNotAuthorizedToBook => Err(ClientError::Unauthorized(
                "caller is not allowed to book this laborer".to_string(),
            )),
            BookingResponse::InvalidFieldValues => Err(ClientError::InvalidFields(
                "backend rejected the booking fields".to_string(),
            )),
        }
    }
}

/// Raw text of the booking form. Conversion borrows the form so the
/// entered values survive a failed submit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingForm {
    pub service_type: String,
    pub date_time: String,
    pub duration_hours: String,
    pub location: String,
    pub details: String,
}

impl BookingForm {
    pub fn to_input(&self, target_laborer: &Principal) -> Result<BookingInput, ClientError> {
        let date_time = parse_form_date_time(&self.date_time)?;
        let duration_hours = self.duration_hours.trim().parse::<u64>().map_err(|_| {
            ClientError::InvalidFields(format!(
                "duration \"{}\" is not a whole number of hours",
                self.duration_hours
            ))
        })?;
        let details = Some(self.details.trim())
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        Ok(BookingInput {
            service_type: self.service_type.trim().to_string(),
            target_laborer: target_laborer.clone(),
            duration_hours,
            details,
            date_time,
            location: self.location.trim().to_string(),
        })
    }
}

// datetime-local inputs carry no zone; they are read as UTC.
fn parse_form_date_time(text: &str) -> Result<Time, ClientError> {
    let text = text.trim();
    let parsed = DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M").map(|dt| dt.and_utc()))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M").map(|dt| dt.and_utc())
        })
        .map_err(|_| ClientError::InvalidFields(format!("date/time \"{text}\" is not valid")))?;

    parsed
        .timestamp_nanos_opt()
        .ok_or_else(|| ClientError::InvalidFields(format!("date/time \"{text}\" is out of range")))
}
