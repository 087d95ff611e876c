//! Threshold alert notification
//!
//! After a run, an operator alert is sent when the report has any critical
//! issue or at least ten high issues. Delivery goes through an
//! [`EmailSender`]; the production sender posts to the Resend HTTP API.
//! Notification is best-effort: every outcome is reported as a
//! [`NotificationOutcome`], never as an error.

use std::sync::Arc;
use std::time::Duration;

use axum::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::validation::{MaterialValidation, Severity, ValidationReport};

const RESEND_API_URL: &str = "https://api.resend.com/emails";
const USER_AGENT: &str = concat!("efq-mv/", env!("CARGO_PKG_VERSION"));

/// Sender used when none is configured
pub const DEFAULT_FROM: &str = "EFQ Alerts <alerts@efq.local>";

/// Materials listed per severity section of the alert
pub const ALERT_LIST_LIMIT: usize = 10;

/// Email delivery errors
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Invalid API key")]
    InvalidApiKey,
}

/// Result of the notification step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Sent,
    Skipped(String),
    Failed(String),
}

/// One outbound email
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Outbound email transport
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), NotifyError>;
}

/// Receives the finished report of every run
#[async_trait]
pub trait NotificationPort: Send + Sync {
    async fn notify(&self, report: &ValidationReport) -> NotificationOutcome;
}

/// Resend transactional email client
pub struct ResendClient {
    http_client: reqwest::Client,
    api_key: String,
}

impl ResendClient {
    pub fn new(api_key: String) -> Result<Self, NotifyError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NotifyError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
        })
    }
}

#[async_trait]
impl EmailSender for ResendClient {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        debug!(to = ?message.to, "Sending email via Resend");

        let response = self
            .http_client
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(message)
            .send()
            .await
            .map_err(|e| NotifyError::Network(e.to_string()))?;

        let status = response.status();

        if status == 401 || status == 403 {
            return Err(NotifyError::InvalidApiKey);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api(status.as_u16(), error_text));
        }

        Ok(())
    }
}

/// Threshold check, alert composition and delivery
pub struct NotificationDispatcher {
    sender: Option<Arc<dyn EmailSender>>,
    operator_email: Option<String>,
    from: String,
}

impl NotificationDispatcher {
    /// `sender` is `None` when no email API key is configured
    pub fn new(
        sender: Option<Arc<dyn EmailSender>>,
        operator_email: Option<String>,
        from: Option<String>,
    ) -> Self {
        Self {
            sender,
            operator_email: operator_email.filter(|e| !e.trim().is_empty()),
            from: from
                .filter(|f| !f.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FROM.to_string()),
        }
    }

    /// Any critical issue, or at least ten high issues
    pub fn should_notify(report: &ValidationReport) -> bool {
        report.exceeds_alert_threshold()
    }

    /// Build the alert email for a report
    pub fn compose(&self, report: &ValidationReport, to: &str) -> EmailMessage {
        let counts = &report.issue_counts;
        let subject = format!(
            "Material Validation Alert: {} Critical, {} High Issues Found",
            counts.critical, counts.high
        );

        let critical: Vec<&MaterialValidation> = report
            .flagged_materials
            .iter()
            .filter(|m| m.has_severity(Severity::Critical))
            .take(ALERT_LIST_LIMIT)
            .collect();
        let high: Vec<&MaterialValidation> = report
            .flagged_materials
            .iter()
            .filter(|m| m.has_severity(Severity::High) && !m.has_severity(Severity::Critical))
            .take(ALERT_LIST_LIMIT)
            .collect();

        // Report timestamps are RFC 3339; the date is the first ten characters
        let date = report.timestamp.get(..10).unwrap_or(&report.timestamp);

        let mut html = String::new();
        html.push_str(r#"<div style="font-family: Arial, sans-serif; max-width: 700px; margin: 0 auto;">"#);
        html.push_str(r#"<h1 style="color: #dc2626;">Material Validation Alert</h1>"#);
        html.push_str(&format!(
            r#"<p>The material database validation has completed with <strong style="color: #dc2626;">{} critical</strong> and <strong style="color: #f59e0b;">{} high</strong> severity issues requiring attention.</p>"#,
            counts.critical, counts.high
        ));
        html.push_str(r#"<h3>Validation Summary</h3><table style="width: 100%; border-collapse: collapse;">"#);
        for (label, value) in [
            ("Total Materials", report.total_materials.to_string()),
            ("Pass Rate", format!("{}%", report.pass_rate)),
            ("Critical Issues", counts.critical.to_string()),
            ("High Issues", counts.high.to_string()),
            ("Outliers Detected", report.outlier_count.to_string()),
            ("Validation Date", date.to_string()),
        ] {
            html.push_str(&format!(
                "<tr><td><strong>{}:</strong></td><td>{}</td></tr>",
                label,
                html_escape(&value)
            ));
        }
        html.push_str("</table>");

        push_issue_list(&mut html, "Critical Issues (Top 10)", &critical, Severity::Critical);
        push_issue_list(&mut html, "High Priority Issues (Top 10)", &high, Severity::High);

        html.push_str(&format!(
            r#"<p style="margin-top: 30px; color: #666; font-size: 12px;">Automated notification from the EFQ material validation service, ruleset {}.</p>"#,
            html_escape(&report.version)
        ));
        html.push_str("</div>");

        EmailMessage {
            from: self.from.clone(),
            to: vec![to.to_string()],
            subject,
            html,
        }
    }
}

#[async_trait]
impl NotificationPort for NotificationDispatcher {
    async fn notify(&self, report: &ValidationReport) -> NotificationOutcome {
        if !Self::should_notify(report) {
            return NotificationOutcome::Skipped("below alert threshold".to_string());
        }

        let Some(sender) = &self.sender else {
            warn!("Email API key not configured, skipping alert notification");
            return NotificationOutcome::Skipped("email API key not configured".to_string());
        };

        let Some(to) = &self.operator_email else {
            warn!("Operator email not configured, skipping alert notification");
            return NotificationOutcome::Skipped("operator email not configured".to_string());
        };

        let message = self.compose(report, to);
        match sender.send_email(&message).await {
            Ok(()) => {
                info!(to = %to, "Alert email sent");
                NotificationOutcome::Sent
            }
            Err(e) => {
                warn!(error = %e, "Failed to send alert email");
                NotificationOutcome::Failed(e.to_string())
            }
        }
    }
}

fn push_issue_list(
    html: &mut String,
    heading: &str,
    materials: &[&MaterialValidation],
    severity: Severity,
) {
    if materials.is_empty() {
        return;
    }

    html.push_str(&format!("<h3>{}</h3><ul>", heading));
    for material in materials {
        let messages: Vec<&str> = material
            .issues
            .iter()
            .filter(|i| i.severity == severity)
            .map(|i| i.message.as_str())
            .collect();
        html.push_str(&format!(
            "<li><strong>{}</strong> ({}): {}</li>",
            html_escape(&material.material_name),
            html_escape(&material.material_category),
            html_escape(&messages.join(", "))
        ));
    }
    html.push_str("</ul>");
}

/// Escape text for inclusion in HTML element content
pub fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
