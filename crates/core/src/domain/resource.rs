use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::JobId;
use crate::forms::VehicleAssignmentForm;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub String);

impl ResourceId {
    pub fn generate() -> Self {
        Self(format!("RES-{}", Uuid::new_v4().simple()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Vehicle,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vehicle => "vehicle",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "vehicle" => Some(Self::Vehicle),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Available,
    Assigned,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Assigned => "assigned",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "available" => Some(Self::Available),
            "assigned" => Some(Self::Assigned),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    pub resource_type: ResourceType,
    pub quantity: u32,
    pub unit: String,
    pub status: ResourceStatus,
    pub assigned_to: Option<JobId>,
    pub driver_name: Option<String>,
    pub driver_license: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Resource {
    /// One vehicle row per assignment; jobs carry no back-reference.
    pub fn vehicle_assignment(
        job_id: JobId,
        form: &VehicleAssignmentForm,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ResourceId::generate(),
            name: format!("Vehicle: {}", form.vehicle_plate.trim()),
            resource_type: ResourceType::Vehicle,
            quantity: 1,
            unit: form.vehicle_type.trim().to_string(),
            status: ResourceStatus::Assigned,
            assigned_to: Some(job_id),
            driver_name: Some(form.driver_name.trim().to_string()),
            driver_license: Some(form.driver_license.trim().to_string()),
            created_at: at,
        }
    }
}
