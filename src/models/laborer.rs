use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::booking::{Booking, Time};
use super::user::Principal;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub name: String,
    pub description: String,
    pub price: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum AvailabilityStatus {
    Pending,
    OnJob,
    Custom { text: String },
    Available,
    Unavailable,
}

impl AvailabilityStatus {
    pub fn label(&self) -> &str {
        match self {
            AvailabilityStatus::Pending => "Pending",
            AvailabilityStatus::OnJob => "On Job",
            AvailabilityStatus::Custom { text } => text,
            AvailabilityStatus::Available => "Available",
            AvailabilityStatus::Unavailable => "Unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub status: AvailabilityStatus,
    pub last_updated: Time,
}

impl Availability {
    pub fn new(status: AvailabilityStatus, last_updated: Time) -> Self {
        Self {
            status,
            last_updated,
        }
    }

    pub fn is_bookable(&self) -> bool {
        !matches!(self.status, AvailabilityStatus::Unavailable)
    }
}

/// Fields a laborer edits about themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaborerInput {
    pub name: String,
    pub contact: String,
    #[serde(default)]
    pub mobile_number: String,
    pub location: String,
    pub skills: BTreeSet<String>,
    pub services: Vec<Service>,
    pub availability: Availability,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaborerProfile {
    pub id: Principal,
    pub name: String,
    pub contact: String,
    #[serde(default)]
    pub mobile_number: String,
    pub location: String,
    pub skills: BTreeSet<String>,
    pub services: Vec<Service>,
    pub availability: Availability,
    #[serde(default)]
    pub bookings: Vec<Booking>,
}

impl LaborerProfile {
    pub fn from_input(id: Principal, input: LaborerInput, bookings: Vec<Booking>) -> Self {
        Self {
            id,
            name: input.name,
            contact: input.contact,
            mobile_number: input.mobile_number,
            location: input.location,
            skills: input.skills,
            services: input.services,
            availability: input.availability,
            bookings,
        }
    }

    pub fn booking(&self, id: u64) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }
}
