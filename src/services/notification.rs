//! Owner notification for pet sightings
//!
//! When a finder shares their location the owner is told through every channel
//! available: an e-mail over SMTP when configured, plus SMS and WhatsApp deep
//! links the finder's device can open when the owner left a phone number.

use anyhow::anyhow;
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Serialize;
use std::sync::Arc;

use crate::config::SmtpConfig;
use crate::models::Pet;

/// Error types for sighting notification
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    /// Nothing reached the owner
    #[error("Could not notify the owner: {0}")]
    DeliveryFailed(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Outgoing e-mail transport
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// SMTP mailer backed by lettre
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .credentials(creds)
            .port(config.port)
            .build();

        Ok(Self {
            transport,
            from: format!("{} <{}>", config.from_name, config.from),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(self.from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;
        Ok(())
    }
}

/// How the owner was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// E-mail delivered
    Notified,
    /// E-mail failed; phone links are still available
    Partial,
    /// No mailer configured; phone links only
    LinksOnly,
}

/// Result of a sighting report
#[derive(Debug, Clone, Serialize)]
pub struct SightingReport {
    pub status: ReportStatus,
    pub map_link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp_link: Option<String>,
}

/// Sighting notification service
pub struct NotificationService {
    mailer: Option<Arc<dyn Mailer>>,
}

impl NotificationService {
    pub fn new(mailer: Option<Arc<dyn Mailer>>) -> Self {
        Self { mailer }
    }

    /// Build from optional SMTP settings
    pub fn from_config(smtp: Option<&SmtpConfig>) -> anyhow::Result<Self> {
        let mailer = match smtp {
            Some(config) => Some(Arc::new(SmtpMailer::new(config)?) as Arc<dyn Mailer>),
            None => None,
        };
        Ok(Self::new(mailer))
    }

    pub fn email_enabled(&self) -> bool {
        self.mailer.is_some()
    }

    /// Notify the owner of `pet` that it was seen at (`lat`, `lng`)
    pub async fn report_sighting(
        &self,
        pet: &Pet,
        lat: f64,
        lng: f64,
    ) -> Result<SightingReport, NotifyError> {
        validate_coordinates(lat, lng)?;

        let map_link = map_link(lat, lng);
        let text = sighting_message(&pet.name, &map_link);
        let phone = pet.owner_phone.as_deref().filter(|p| phone_digits(p).len() >= 6);
        let sms_link = phone.map(|p| sms_link(p, &text));
        let whatsapp_link = phone.map(|p| whatsapp_link(p, &text));

        let status = match &self.mailer {
            Some(mailer) => {
                let subject = format!("{} was seen!", pet.name);
                match mailer.send(&pet.owner_email, &subject, &text).await {
                    Ok(()) => {
                        tracing::info!(pet_id = %pet.id, "Owner notified by e-mail");
                        ReportStatus::Notified
                    }
                    Err(e) if phone.is_some() => {
                        tracing::warn!(pet_id = %pet.id, error = %e, "E-mail failed, phone links remain");
                        ReportStatus::Partial
                    }
                    Err(e) => {
                        tracing::error!(pet_id = %pet.id, error = %e, "Failed to notify owner");
                        return Err(NotifyError::DeliveryFailed(e.to_string()));
                    }
                }
            }
            None if phone.is_some() => ReportStatus::LinksOnly,
            None => {
                return Err(NotifyError::DeliveryFailed(
                    "no notification channel is available for this owner".to_string(),
                ))
            }
        };

        Ok(SightingReport {
            status,
            map_link,
            sms_link,
            whatsapp_link,
        })
    }
}

/// Latitude in [-90, 90], longitude in [-180, 180], both finite
pub fn validate_coordinates(lat: f64, lng: f64) -> Result<(), NotifyError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(NotifyError::InvalidCoordinates(format!(
            "latitude {} is out of range",
            lat
        )));
    }
    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        return Err(NotifyError::InvalidCoordinates(format!(
            "longitude {} is out of range",
            lng
        )));
    }
    Ok(())
}

pub fn map_link(lat: f64, lng: f64) -> String {
    format!("https://www.google.com/maps?q={},{}", lat, lng)
}

pub fn sighting_message(pet_name: &str, map_link: &str) -> String {
    format!(
        "Your pet '{}' was seen!\n\nLocation:\n{}",
        pet_name, map_link
    )
}

/// `sms:` link; keeps a leading `+` for international numbers
pub fn sms_link(phone: &str, text: &str) -> String {
    let plus = if phone.trim_start().starts_with('+') { "+" } else { "" };
    format!(
        "sms:{}{}?body={}",
        plus,
        phone_digits(phone),
        urlencoding::encode(text)
    )
}

/// WhatsApp click-to-chat link (digits only, no `+`)
pub fn whatsapp_link(phone: &str, text: &str) -> String {
    format!(
        "https://wa.me/{}?text={}",
        phone_digits(phone),
        urlencoding::encode(text)
    )
}

fn phone_digits(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    /// Records messages; fails when `fail` is set
    #[derive(Default)]
    struct RecordingMailer {
        fail: bool,
        sent: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
            if self.fail {
                return Err(anyhow!("smtp down"));
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), body.to_string()));
            Ok(())
        }
    }

    fn pet(phone: Option<&str>) -> Pet {
        let now = Utc::now();
        Pet {
            id: "ABCD1234".to_string(),
            owner_id: 1,
            name: "Rex".to_string(),
            species: None,
            breed: None,
            description: None,
            owner_name: None,
            owner_email: "owner@x.com".to_string(),
            owner_phone: phone.map(str::to_string),
            photo_url: None,
            city: None,
            address: None,
            found: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_links() {
        assert_eq!(
            map_link(40.4168, -3.7038),
            "https://www.google.com/maps?q=40.4168,-3.7038"
        );
        assert_eq!(sms_link("+34 600-111 222", "hi there"), "sms:+34600111222?body=hi%20there");
        assert_eq!(
            whatsapp_link("+34 600-111 222", "a&b"),
            "https://wa.me/34600111222?text=a%26b"
        );
    }

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_coordinates(0.0, 0.0).is_ok());
        assert!(validate_coordinates(90.0, -180.0).is_ok());
        assert!(validate_coordinates(90.1, 0.0).is_err());
        assert!(validate_coordinates(0.0, 180.5).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }

    #[tokio::test]
    async fn test_report_sends_email() {
        let mailer = Arc::new(RecordingMailer::default());
        let service = NotificationService::new(Some(mailer.clone()));

        let report = service.report_sighting(&pet(None), 1.5, 2.5).await.unwrap();
        assert_eq!(report.status, ReportStatus::Notified);
        assert!(report.sms_link.is_none());

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "owner@x.com");
        assert!(sent[0].2.contains("https://www.google.com/maps?q=1.5,2.5"));
    }

    #[tokio::test]
    async fn test_email_failure_with_phone_is_partial() {
        let mailer = Arc::new(RecordingMailer {
            fail: true,
            ..RecordingMailer::default()
        });
        let service = NotificationService::new(Some(mailer));

        let report = service
            .report_sighting(&pet(Some("+34 600 111 222")), 1.0, 1.0)
            .await
            .unwrap();
        assert_eq!(report.status, ReportStatus::Partial);
        assert!(report.whatsapp_link.unwrap().starts_with("https://wa.me/34600111222"));
    }

    #[tokio::test]
    async fn test_email_failure_without_phone_fails() {
        let mailer = Arc::new(RecordingMailer {
            fail: true,
            ..RecordingMailer::default()
        });
        let service = NotificationService::new(Some(mailer));

        let result = service.report_sighting(&pet(None), 1.0, 1.0).await;
        assert!(matches!(result, Err(NotifyError::DeliveryFailed(_))));
    }

    #[tokio::test]
    async fn test_no_mailer() {
        let service = NotificationService::new(None);
        assert!(!service.email_enabled());

        let report = service
            .report_sighting(&pet(Some("600111222")), 1.0, 1.0)
            .await
            .unwrap();
        assert_eq!(report.status, ReportStatus::LinksOnly);
        assert!(report.sms_link.unwrap().starts_with("sms:600111222?body="));

        let result = service.report_sighting(&pet(None), 1.0, 1.0).await;
        assert!(matches!(result, Err(NotifyError::DeliveryFailed(_))));
    }

    #[tokio::test]
    async fn test_invalid_coordinates_send_nothing() {
        let mailer = Arc::new(RecordingMailer::default());
        let service = NotificationService::new(Some(mailer.clone()));

        let result = service.report_sighting(&pet(None), 91.0, 0.0).await;
        assert!(matches!(result, Err(NotifyError::InvalidCoordinates(_))));
        assert!(mailer.sent.lock().unwrap().is_empty());
    }
}
