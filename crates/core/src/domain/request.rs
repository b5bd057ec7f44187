use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::payload::RequestPayload;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Trf,
    Claims,
    Visa,
    Transport,
    Accommodation,
}

impl RequestKind {
    pub const ALL: [RequestKind; 5] =
        [Self::Trf, Self::Claims, Self::Visa, Self::Transport, Self::Accommodation];

    /// Route segment and persisted discriminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trf => "trf",
            Self::Claims => "claims",
            Self::Visa => "visa",
            Self::Transport => "transport",
            Self::Accommodation => "accommodation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trf" | "tsr" | "travel" => Some(Self::Trf),
            "claims" | "claim" | "expense" => Some(Self::Claims),
            "visa" => Some(Self::Visa),
            "transport" => Some(Self::Transport),
            "accommodation" => Some(Self::Accommodation),
            _ => None,
        }
    }

    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Trf => "TSR",
            Self::Claims => "CLM",
            Self::Visa => "VSA",
            Self::Transport => "TRN",
            Self::Accommodation => "ACC",
        }
    }

    /// Entity name carried in notification payloads.
    pub fn entity_type(&self) -> &'static str {
        match self {
            Self::Trf => "travel_request",
            Self::Claims => "expense_claim",
            Self::Visa => "visa_application",
            Self::Transport => "transport_request",
            Self::Accommodation => "accommodation_booking",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Trf => "Travel Request",
            Self::Claims => "Expense Claim",
            Self::Visa => "Visa Application",
            Self::Transport => "Transport Request",
            Self::Accommodation => "Accommodation Booking",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    /// `<PREFIX>-<YYYYMMDD>-<6 hex>`, e.g. `TSR-20261018-3FA2C1`.
    pub fn generate(kind: RequestKind, now: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string()[..6].to_ascii_uppercase();
        Self(format!("{}-{}-{}", kind.id_prefix(), now.format("%Y%m%d"), suffix))
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requestor {
    pub id: String,
    pub name: String,
    pub email: String,
    pub department: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ServiceRequest {
    pub id: RequestId,
    pub kind: RequestKind,
    pub requestor: Requestor,
    /// Stored as written; may hold a legacy status name for older rows.
    pub status: String,
    pub payload: RequestPayload,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceRequest {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.requestor.id == user_id
    }
}
