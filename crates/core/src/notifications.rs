use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::domain::request::{RequestId, RequestKind, Requestor};
use crate::workflow::WorkflowAction;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub entity_type: String,
    pub kind: RequestKind,
    pub entity_id: RequestId,
    pub requestor: Requestor,
    /// `None` for a fresh submission.
    pub previous_status: Option<String>,
    pub next_status: String,
    pub action: Option<WorkflowAction>,
    pub approver: Option<String>,
    pub comments: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn submitted(
        kind: RequestKind,
        entity_id: RequestId,
        requestor: Requestor,
        status: impl Into<String>,
    ) -> Self {
        Self {
            entity_type: kind.entity_type().to_string(),
            kind,
            entity_id,
            requestor,
            previous_status: None,
            next_status: status.into(),
            action: None,
            approver: None,
            comments: None,
            occurred_at: Utc::now(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn transitioned(
        kind: RequestKind,
        entity_id: RequestId,
        requestor: Requestor,
        previous_status: impl Into<String>,
        next_status: impl Into<String>,
        action: WorkflowAction,
        approver: impl Into<String>,
        comments: Option<String>,
    ) -> Self {
        Self {
            entity_type: kind.entity_type().to_string(),
            kind,
            entity_id,
            requestor,
            previous_status: Some(previous_status.into()),
            next_status: next_status.into(),
            action: Some(action),
            approver: Some(approver.into()),
            comments,
            occurred_at: Utc::now(),
        }
    }

    pub fn event_name(&self) -> String {
        match self.action {
            None => format!("{}.submitted", self.kind),
            Some(action) => format!("{}.{}", self.kind, action),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification transport failed: {0}")]
    Transport(String),
    #[error("notification service rejected event with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("notification rendering failed: {0}")]
    Render(String),
}

/// Best-effort side channel; callers log failures and never roll back.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &NotificationEvent) -> Result<(), NotificationError>;
}

#[derive(Clone, Default)]
pub struct InMemoryNotifier {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
}

impl InMemoryNotifier {
    pub fn events(&self) -> Vec<NotificationEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<(), NotificationError> {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
        Ok(())
    }
}

/// Hex HMAC-SHA256 of `body`, sent as the webhook signature header.
pub fn sign_payload(secret: &[u8], body: &[u8]) -> Result<String, NotificationError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|error| NotificationError::Transport(format!("invalid signing key: {error}")))?;
    mac.update(body);
    Ok(encode_hex(mac.finalize().into_bytes().as_slice()))
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::{sign_payload, InMemoryNotifier, NotificationEvent, Notifier};
    use crate::domain::request::{RequestId, RequestKind, Requestor};
    use crate::workflow::WorkflowAction;

    fn requestor() -> Requestor {
        Requestor {
            id: "u-100".to_string(),
            name: "Aina Rahman".to_string(),
            email: "aina@example.com".to_string(),
            department: "Drilling".to_string(),
        }
    }

    #[tokio::test]
    async fn in_memory_notifier_records_events() {
        let notifier = InMemoryNotifier::default();
        let event = NotificationEvent::transitioned(
            RequestKind::Visa,
            RequestId("VSA-20261018-0A1B2C".to_string()),
            requestor(),
            "Pending HOD",
            "Processing with Visa Admin",
            WorkflowAction::Approve,
            "Devi",
            None,
        );

        notifier.notify(&event).await.expect("notify");

        let events = notifier.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].entity_type, "visa_application");
        assert_eq!(events[0].event_name(), "visa.approve");
    }

    #[test]
    fn submitted_event_has_no_previous_status() {
        let event = NotificationEvent::submitted(
            RequestKind::Trf,
            RequestId("TSR-20261018-0A1B2C".to_string()),
            requestor(),
            "Pending Department Focal",
        );

        assert_eq!(event.previous_status, None);
        assert_eq!(event.event_name(), "trf.submitted");
    }

    #[test]
    fn signature_matches_known_hmac_vector() {
        // RFC 4231 test case 2.
        let signature =
            sign_payload(b"Jefe", b"what do ya want for nothing?").expect("signature");

        assert_eq!(
            signature,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }
}
