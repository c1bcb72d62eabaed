//! Digest email delivery
//!
//! The primary provider is an HTTP API (`POST {base}/emails` with
//! `{from, to, subject, html, text}` and a Bearer key). When it is missing or
//! fails, the digest goes out through an SMTP relay via lettre.

use std::fmt::Write;
use std::time::Duration;

use lettre::{
    message::MultiPart, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::{Degradable, DegradedReason};
use crate::http::client_with_timeout;
use crate::models::AutomationEvent;
use crate::text::money;

/// Which provider delivered a digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailChannel {
    Api,
    Smtp,
}

/// Month figures appended to the digest when monthly reports are enabled
#[derive(Debug, Clone, PartialEq)]
pub struct DigestSummary {
    pub period: String,
    pub income: f64,
    pub expense: f64,
    pub forecast_net: f64,
}

/// A rendered digest
#[derive(Debug, Clone, PartialEq)]
pub struct Digest {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Render the digest for a set of surviving events
pub fn render_digest(events: &[AutomationEvent], summary: Option<&DigestSummary>) -> Digest {
    let subject = match events {
        [only] => format!("Nudge: {}", only.title),
        _ => format!("Nudge: {} new alerts", events.len()),
    };

    let mut text = String::new();
    let mut html = String::from("<h2>Your Nudge alerts</h2>\n<ul>\n");
    for event in events {
        let _ = writeln!(text, "{} {}\n{}\n", event.severity.icon(), event.title, event.body);
        let _ = writeln!(
            html,
            "<li><strong>{} {}</strong><br>{}</li>",
            event.severity.icon(),
            escape_html(&event.title),
            escape_html(&event.body)
        );
    }
    html.push_str("</ul>\n");

    if let Some(s) = summary {
        let _ = writeln!(
            text,
            "Month {}: income {}, expenses {}, projected net {}",
            s.period,
            money(s.income),
            money(s.expense),
            money(s.forecast_net)
        );
        let _ = writeln!(
            html,
            "<p>Month {}: income {}, expenses {}, projected net {}</p>",
            s.period,
            money(s.income),
            money(s.expense),
            money(s.forecast_net)
        );
    }

    Digest {
        subject,
        text: text.trim_end().to_string(),
        html,
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// SMTP relay settings for the fallback path
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

/// Sends digests through the primary API, falling back to SMTP
#[derive(Clone)]
pub struct EmailSender {
    http_client: Client,
    api_url: Option<String>,
    api_key: Option<String>,
    from: String,
    smtp: Option<SmtpSettings>,
    timeout: Duration,
}

impl EmailSender {
    pub fn new(from: &str, timeout: Duration) -> Self {
        Self {
            http_client: client_with_timeout(timeout),
            api_url: None,
            api_key: None,
            from: from.to_string(),
            smtp: None,
            timeout,
        }
    }

    pub fn with_api(mut self, base_url: &str, api_key: Option<&str>) -> Self {
        self.api_url = Some(base_url.trim_end_matches('/').to_string());
        self.api_key = api_key.map(str::to_string);
        self
    }

    pub fn with_smtp(mut self, smtp: SmtpSettings) -> Self {
        self.smtp = Some(smtp);
        self
    }

    /// Build from provider config; None when neither provider is configured
    pub fn from_config(providers: &ProviderConfig, timeout: Duration) -> Option<Self> {
        if providers.email_api_url.is_none() && providers.smtp_host.is_none() {
            return None;
        }
        let mut sender = Self::new(&providers.email_from, timeout);
        if let Some(url) = &providers.email_api_url {
            sender = sender.with_api(url, providers.email_api_key.as_deref());
        }
        if let Some(host) = &providers.smtp_host {
            sender = sender.with_smtp(SmtpSettings {
                host: host.clone(),
                port: providers.smtp_port,
                username: providers.smtp_username.clone(),
                password: providers.smtp_password.clone(),
            });
        }
        Some(sender)
    }

    /// Deliver `digest` to `to`
    ///
    /// Returns the channel that delivered it, or the last failure when both
    /// providers failed.
    pub async fn send(&self, to: &str, digest: &Digest) -> Degradable<EmailChannel> {
        let mut last_failure = DegradedReason::NotConfigured("email provider");

        if let Some(api_url) = &self.api_url {
            match self.send_api(api_url, to, digest).await {
                Ok(()) => return Ok(EmailChannel::Api),
                Err(reason) => {
                    warn!(reason = %reason, "Email API failed, trying SMTP fallback");
                    last_failure = reason;
                }
            }
        }

        if let Some(smtp) = &self.smtp {
            return self
                .send_smtp(smtp, to, digest)
                .await
                .map(|()| EmailChannel::Smtp);
        }

        Err(last_failure)
    }

    async fn send_api(&self, api_url: &str, to: &str, digest: &Digest) -> Degradable<()> {
        let request = EmailRequest {
            from: &self.from,
            to: [to],
            subject: &digest.subject,
            html: &digest.html,
            text: &digest.text,
        };

        let mut req_builder = self
            .http_client
            .post(format!("{}/emails", api_url))
            .json(&request);
        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DegradedReason::Status(status.as_u16()));
        }
        debug!("Digest sent through email API");
        Ok(())
    }

    async fn send_smtp(&self, smtp: &SmtpSettings, to: &str, digest: &Digest) -> Degradable<()> {
        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| DegradedReason::Unparsable(format!("sender address: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| DegradedReason::Unparsable(format!("recipient address: {e}")))?)
            .subject(digest.subject.as_str())
            .multipart(MultiPart::alternative_plain_html(
                digest.text.clone(),
                digest.html.clone(),
            ))
            .map_err(|e| DegradedReason::Unparsable(e.to_string()))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
            .map_err(|e| DegradedReason::Transport(e.to_string()))?
            .port(smtp.port)
            .timeout(Some(self.timeout));
        if let (Some(user), Some(pass)) = (&smtp.username, &smtp.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        builder
            .build()
            .send(message)
            .await
            .map_err(|e| DegradedReason::Transport(e.to_string()))?;
        debug!(host = %smtp.host, "Digest sent through SMTP");
        Ok(())
    }
}
