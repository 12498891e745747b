use std::fmt;

use serde::Serialize;

use crate::errors::ClientError;
use crate::services::queries::LaborClient;
use crate::services::session::LoginStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Error,
    Untested,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: &'static str,
    pub status: HealthStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub components: Vec<ComponentHealth>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.components
            .iter()
            .all(|c| c.status == HealthStatus::Healthy)
    }

    pub fn component(&self, name: &str) -> Option<&ComponentHealth> {
        self.components.iter().find(|c| c.name == name)
    }
}

impl fmt::Display for HealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.components {
            let mark = match c.status {
                HealthStatus::Healthy => "ok",
                HealthStatus::Error => "FAIL",
                HealthStatus::Untested => "--",
            };
            writeln!(f, "[{mark:>4}] {}: {}", c.name, c.message)?;
            if let Some(details) = &c.details {
                writeln!(f, "       {details}")?;
            }
        }
        Ok(())
    }
}

pub async fn check_health(client: &LaborClient) -> HealthReport {
    let session = client.session();
    let mut components = vec![];

    components.push(match session.identity() {
        Some(principal) => component("Authentication", HealthStatus::Healthy, format!("Signed in as {principal}")),
        None => component("Authentication", HealthStatus::Error, "Not signed in".to_string()),
    });

    let status = session.status();
    components.push(match status {
        LoginStatus::Ready => component("Backend connection", HealthStatus::Healthy, "Connected".to_string()),
        LoginStatus::Connecting => {
            component("Backend connection", HealthStatus::Untested, "Connecting".to_string())
        }
        LoginStatus::Idle => {
            component("Backend connection", HealthStatus::Error, "No backend actor".to_string())
        }
    });

    if status != LoginStatus::Ready {
        for name in ["User profile", "Laborer profile", "Bookings"] {
            components.push(component(name, HealthStatus::Untested, "Waiting for connection".to_string()));
        }
        return HealthReport { components };
    }

    components.push(check(
        "User profile",
        client.get_caller_user_profile().await,
        |profile| match profile {
            Some(p) => format!("Profile found: {}", p.name),
            None => "No profile saved yet".to_string(),
        },
    ));
    components.push(check(
        "Laborer profile",
        client.get_caller_laborer().await,
        |laborer| match laborer {
            Some(l) => format!("{} ({} bookings)", l.name, l.bookings.len()),
            None => "No laborer profile".to_string(),
        },
    ));
    components.push(check("Bookings", client.get_bookings().await, |overview| {
        format!(
            "{} incoming, {} outgoing",
            overview.incoming.len(),
            overview.outgoing.len()
        )
    }));

    let report = HealthReport { components };
    if report.is_healthy() {
        tracing::info!("health check passed");
    } else {
        tracing::warn!("health check found problems");
    }
    report
}

fn component(name: &'static str, status: HealthStatus, message: String) -> ComponentHealth {
    ComponentHealth {
        name,
        status,
        message,
        details: None,
    }
}

fn check<T>(
    name: &'static str,
    result: Result<T, ClientError>,
    describe: impl FnOnce(&T) -> String,
) -> ComponentHealth {
    match result {
        Ok(value) => component(name, HealthStatus::Healthy, describe(&value)),
        Err(e) => ComponentHealth {
            name,
            status: HealthStatus::Error,
            message: e.user_message(),
            details: Some(e.to_string()),
        },
    }
}
