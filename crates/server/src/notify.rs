use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tera::{Context, Tera};
use tracing::{info, warn};

use tripflow_core::config::NotificationConfig;
use tripflow_core::notifications::{sign_payload, NotificationError, NotificationEvent, Notifier};

pub const SIGNATURE_HEADER: &str = "X-Tripflow-Signature";
pub const EVENT_HEADER: &str = "X-Tripflow-Event";

const SUBJECT_TEMPLATE: &str = "subject.txt";
const BODY_TEMPLATE: &str = "body.txt";

const SUBJECT_SOURCE: &str =
    "[Tripflow] {{ label }} {{ entity_id }}: {{ next_status }}";

const BODY_SOURCE: &str = r#"Hello {{ requestor_name }},

{% if previous_status -%}
{{ label }} {{ entity_id }} moved from "{{ previous_status }}" to "{{ next_status }}"{% if approver %} by {{ approver }}{% endif %}.
{%- else -%}
{{ label }} {{ entity_id }} was submitted and is now "{{ next_status }}".
{%- endif %}
{% if comments %}
Comments: {{ comments }}
{% endif %}
"#;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    event: String,
    subject: String,
    body: String,
    #[serde(flatten)]
    notification: &'a NotificationEvent,
}

/// Renders subject and body lines for a notification event.
pub struct NotificationTemplates {
    tera: Tera,
}

impl NotificationTemplates {
    pub fn new() -> Result<Self, NotificationError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![(SUBJECT_TEMPLATE, SUBJECT_SOURCE), (BODY_TEMPLATE, BODY_SOURCE)])
            .map_err(|error| NotificationError::Render(error.to_string()))?;
        Ok(Self { tera })
    }

    pub fn render(&self, event: &NotificationEvent) -> Result<(String, String), NotificationError> {
        let mut context = Context::new();
        context.insert("label", event.kind.label());
        context.insert("entity_id", &event.entity_id.0);
        context.insert("requestor_name", &event.requestor.name);
        context.insert("previous_status", &event.previous_status);
        context.insert("next_status", &event.next_status);
        context.insert("approver", &event.approver);
        context.insert("comments", &event.comments);

        let subject = self
            .tera
            .render(SUBJECT_TEMPLATE, &context)
            .map_err(|error| NotificationError::Render(error.to_string()))?;
        let body = self
            .tera
            .render(BODY_TEMPLATE, &context)
            .map_err(|error| NotificationError::Render(error.to_string()))?;
        Ok((subject.trim().to_string(), body.trim().to_string()))
    }
}

/// POSTs each event as JSON to the configured notification service.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    signing_secret: Option<SecretString>,
    templates: NotificationTemplates,
}

impl WebhookNotifier {
    pub fn new(
        url: impl Into<String>,
        signing_secret: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| NotificationError::Transport(error.to_string()))?;
        Ok(Self { client, url: url.into(), signing_secret, templates: NotificationTemplates::new()? })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<(), NotificationError> {
        let (subject, body) = self.templates.render(event)?;
        let event_name = event.event_name();
        let payload =
            serde_json::to_vec(&WebhookPayload { event: event_name.clone(), subject, body, notification: event })
                .map_err(|error| NotificationError::Render(error.to_string()))?;

        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(EVENT_HEADER, &event_name);
        if let Some(secret) = &self.signing_secret {
            let signature = sign_payload(secret.expose_secret().as_bytes(), &payload)?;
            request = request.header(SIGNATURE_HEADER, format!("sha256={signature}"));
        }

        let response = request
            .body(payload)
            .send()
            .await
            .map_err(|error| NotificationError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Rejected { status: status.as_u16(), body });
        }
        Ok(())
    }
}

/// Used when no notification service is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<(), NotificationError> {
        info!(
            event_name = "notification.logged",
            notification = %event.event_name(),
            request_id = %event.entity_id,
            previous_status = event.previous_status.as_deref().unwrap_or("none"),
            next_status = %event.next_status,
            "notification delivery disabled; event logged only"
        );
        Ok(())
    }
}

pub fn build_notifier(config: &NotificationConfig) -> Result<Arc<dyn Notifier>, NotificationError> {
    match (&config.webhook_url, config.enabled) {
        (Some(url), true) => Ok(Arc::new(WebhookNotifier::new(
            url.clone(),
            config.signing_secret.clone(),
            Duration::from_secs(config.timeout_secs),
        )?)),
        _ => Ok(Arc::new(LogNotifier)),
    }
}

/// Fire-and-forget delivery after a committed change. Failures are logged;
/// the transition is never rolled back or retried.
pub fn dispatch(notifier: Arc<dyn Notifier>, event: NotificationEvent, correlation_id: String) {
    tokio::spawn(async move {
        if let Err(error) = notifier.notify(&event).await {
            warn!(
                event_name = "notification.failed",
                correlation_id = %correlation_id,
                request_id = %event.entity_id,
                notification = %event.event_name(),
                error = %error,
                "notification delivery failed"
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;

    use tripflow_core::domain::request::{RequestId, RequestKind, Requestor};
    use tripflow_core::notifications::{sign_payload, NotificationError, NotificationEvent, Notifier};
    use tripflow_core::workflow::WorkflowAction;

    use super::{NotificationTemplates, WebhookNotifier, SIGNATURE_HEADER};

    type Captured = Arc<Mutex<Vec<(HeaderMap, Bytes)>>>;

    fn event() -> NotificationEvent {
        NotificationEvent::transitioned(
            RequestKind::Claims,
            RequestId("CLM-20261018-ABCDEF".to_string()),
            Requestor {
                id: "u-1".to_string(),
                name: "Aina Rahman".to_string(),
                email: "aina@example.com".to_string(),
                department: "Drilling".to_string(),
            },
            "Pending HOD",
            "Processing with Claims Admin",
            WorkflowAction::Approve,
            "Devi Narayanan",
            Some("fine".to_string()),
        )
    }

    async fn capture(State(captured): State<Captured>, headers: HeaderMap, body: Bytes) -> StatusCode {
        captured.lock().expect("capture lock").push((headers, body));
        StatusCode::NO_CONTENT
    }

    async fn spawn_receiver(status: StatusCode) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let app = if status.is_success() {
            Router::new().route("/hook", post(capture)).with_state(captured.clone())
        } else {
            Router::new().route("/hook", post(move || async move { status }))
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{address}/hook"), captured)
    }

    #[test]
    fn templates_render_transition_and_submission() {
        let templates = NotificationTemplates::new().expect("templates");

        let (subject, body) = templates.render(&event()).expect("render");
        assert_eq!(subject, "[Tripflow] Expense Claim CLM-20261018-ABCDEF: Processing with Claims Admin");
        assert!(body.contains("moved from \"Pending HOD\""));
        assert!(body.contains("by Devi Narayanan"));
        assert!(body.contains("Comments: fine"));

        let submitted = NotificationEvent::submitted(
            RequestKind::Trf,
            RequestId("TSR-1".to_string()),
            event().requestor,
            "Pending Department Focal",
        );
        let (_, body) = templates.render(&submitted).expect("render submitted");
        assert!(body.contains("was submitted"));
    }

    #[tokio::test]
    async fn webhook_posts_signed_payload() {
        let (url, captured) = spawn_receiver(StatusCode::NO_CONTENT).await;
        let notifier = WebhookNotifier::new(url, Some("hook-secret".to_string().into()), Duration::from_secs(5))
            .expect("notifier");

        notifier.notify(&event()).await.expect("delivered");

        let requests = captured.lock().expect("capture lock").clone();
        assert_eq!(requests.len(), 1);
        let (headers, body) = &requests[0];
        let expected = format!("sha256={}", sign_payload(b"hook-secret", body).expect("sign"));
        assert_eq!(
            headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok()),
            Some(expected.as_str())
        );

        let json: serde_json::Value = serde_json::from_slice(body).expect("json body");
        assert_eq!(json["event"], "claims.approve");
        assert_eq!(json["entity_type"], "expense_claim");
        assert_eq!(json["previous_status"], "Pending HOD");
        assert_eq!(json["approver"], "Devi Narayanan");
    }

    #[tokio::test]
    async fn webhook_reports_rejection_status() {
        let (url, _) = spawn_receiver(StatusCode::BAD_GATEWAY).await;
        let notifier = WebhookNotifier::new(url, None, Duration::from_secs(5)).expect("notifier");

        let error = notifier.notify(&event()).await.expect_err("rejected");
        assert!(matches!(error, NotificationError::Rejected { status: 502, .. }));
    }
}
