use crate::clients::ClientAggregation;
use crate::duplicates::DuplicateReport;
use crate::error::{AnalyticsError, Result};
use crate::utils::format_number;
use log::{error, info};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// SMTP credentials for alert mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertConfig {
    pub from: String,
    pub password: String,
    pub smtp_host: String,
    pub smtp_port: u16,
}

impl AlertConfig {
    /// Reads `EMAIL_FROM`, `EMAIL_PASSWORD` and the optional `SMTP_HOST` /
    /// `SMTP_PORT`, loading a `.env` file first when one exists.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let (from, password) = match (non_empty("EMAIL_FROM"), non_empty("EMAIL_PASSWORD")) {
            (Some(from), Some(password)) => (from, password),
            _ => {
                return Err(AnalyticsError::Configuration(
                    "Credenciales de correo no configuradas en .env".to_string(),
                ))
            }
        };

        let smtp_port = match non_empty("SMTP_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                AnalyticsError::Configuration(format!("SMTP_PORT is not a valid port: {}", raw))
            })?,
            None => DEFAULT_SMTP_PORT,
        };

        Ok(Self {
            from,
            password,
            smtp_host: non_empty("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            smtp_port,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub subject: String,
    pub body: String,
}

impl Alert {
    pub fn new(subject: &str, body: String) -> Self {
        Self {
            subject: subject.to_string(),
            body,
        }
    }

    /// `None` when there is nothing to report.
    pub fn duplicates(report: &DuplicateReport) -> Option<Self> {
        if report.is_empty() {
            return None;
        }
        let mut body = String::from("Se encontraron almuerzos ejecutivos duplicados.\n");
        for group in &report.groups {
            body.push_str(&format!(
                "\n{} - {}: {}",
                group.client,
                group.day.format("%Y-%m-%d"),
                group.count
            ));
        }
        Some(Self::new("Alerta: Duplicados Detectados", body))
    }

    pub fn unusual_clients(clients: &ClientAggregation) -> Option<Self> {
        if clients.unusual.is_empty() {
            return None;
        }
        let mut body = String::from("Se detectaron clientes con compras inusuales.\n");
        for summary in &clients.unusual {
            body.push_str(&format!(
                "\n{}: ₡{}",
                summary.client,
                format_number((summary.total_sales * 100.0).round() / 100.0)
            ));
        }
        Some(Self::new("Alerta: Compras Inusuales", body))
    }
}

pub trait Mailer {
    fn send(&self, to: &str, alert: &Alert) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlertOutcome {
    Sent,
    Failed(String),
}

impl AlertOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, AlertOutcome::Sent)
    }
}

/// Sends `alert`, logging instead of propagating a failure.
pub fn dispatch<M: Mailer + ?Sized>(mailer: &M, to: &str, alert: &Alert) -> AlertOutcome {
    match mailer.send(to, alert) {
        Ok(()) => {
            info!("Alert '{}' sent to {}", alert.subject, to);
            AlertOutcome::Sent
        }
        Err(e) => {
            error!("Error al enviar correo: {}", e);
            AlertOutcome::Failed(e.to_string())
        }
    }
}

#[cfg(feature = "email")]
pub use smtp::SmtpMailer;

#[cfg(feature = "email")]
mod smtp {
    use super::{Alert, AlertConfig, Mailer};
    use crate::error::{AnalyticsError, Result};
    use lettre::message::header::ContentType;
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{Message, SmtpTransport, Transport};

    /// STARTTLS relay using the configured credentials.
    pub struct SmtpMailer {
        config: AlertConfig,
    }

    impl SmtpMailer {
        pub fn new(config: AlertConfig) -> Self {
            Self { config }
        }
    }

    fn email_err(e: impl std::fmt::Display) -> AnalyticsError {
        AnalyticsError::Email(e.to_string())
    }

    impl Mailer for SmtpMailer {
        fn send(&self, to: &str, alert: &Alert) -> Result<()> {
            let message = Message::builder()
                .from(self.config.from.parse().map_err(email_err)?)
                .to(to.parse().map_err(email_err)?)
                .subject(alert.subject.clone())
                .header(ContentType::TEXT_PLAIN)
                .body(alert.body.clone())
                .map_err(email_err)?;

            let transport = SmtpTransport::starttls_relay(&self.config.smtp_host)
                .map_err(email_err)?
                .port(self.config.smtp_port)
                .credentials(Credentials::new(
                    self.config.from.clone(),
                    self.config.password.clone(),
                ))
                .build();

            transport.send(&message).map_err(email_err)?;
            Ok(())
        }
    }
}
