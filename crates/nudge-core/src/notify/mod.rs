//! Notification fan-out
//!
//! Takes the run's deduplicated events and delivers them on up to three
//! channels, each gated by the user's settings and each best-effort:
//!
//! - internal: alert rows, skipping any `(type, title)` already alerted
//!   within the dedup window (read, then conditionally insert)
//! - push: one gateway call per event per subscription; a failing
//!   subscription does not stop the others
//! - email: a single digest to `notify_email`, API first, SMTP fallback
//!
//! Push and email only run when at least one event survives.

mod email;
mod push;

pub use email::{render_digest, Digest, DigestSummary, EmailChannel, EmailSender, SmtpSettings};
pub use push::PushClient;

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::db::Database;
use crate::error::{DegradedReason, Result};
use crate::models::{AutomationEvent, AutomationSettings};

/// What each channel did for one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct FanoutReport {
    /// Events handed to the fan-out
    pub candidates: usize,
    /// Events left after the window dedup
    pub delivered: Vec<AutomationEvent>,
    pub alerts_inserted: usize,
    pub alerts_suppressed: usize,
    pub push_sent: usize,
    pub push_failed: usize,
    pub email: Option<EmailChannel>,
    pub warnings: Vec<String>,
}

/// Delivers events to the internal, push and email channels
#[derive(Clone)]
pub struct Notifier {
    push: Option<PushClient>,
    email: Option<EmailSender>,
    dedup_window: Duration,
}

impl Notifier {
    pub fn new(push: Option<PushClient>, email: Option<EmailSender>, dedup_window_hours: i64) -> Self {
        Self {
            push,
            email,
            dedup_window: Duration::hours(dedup_window_hours),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let timeout = StdDuration::from_secs(config.policy.http_timeout_secs);
        Self::new(
            PushClient::from_config(&config.providers, timeout),
            EmailSender::from_config(&config.providers, timeout),
            config.policy.dedup_window_hours,
        )
    }

    /// Fan `events` out to every enabled channel
    pub async fn fan_out(
        &self,
        db: &Database,
        settings: &AutomationSettings,
        events: Vec<AutomationEvent>,
        summary: Option<&DigestSummary>,
        now: DateTime<Utc>,
    ) -> FanoutReport {
        let user_id = settings.user_id.as_str();
        let mut report = FanoutReport {
            candidates: events.len(),
            ..Default::default()
        };

        let survivors = if settings.internal_enabled {
            let since = now - self.dedup_window;
            match insert_new_alerts(db, user_id, events.clone(), since, now).await {
                Ok((survivors, suppressed)) => {
                    report.alerts_inserted = survivors.len();
                    report.alerts_suppressed = suppressed;
                    survivors
                }
                Err(e) => {
                    warn!(user_id = user_id, error = %e, "Internal alert channel failed");
                    report.warnings.push(format!("internal alerts unavailable: {}", e));
                    events
                }
            }
        } else {
            events
        };

        if survivors.is_empty() {
            debug!(user_id = user_id, "No events survived dedup");
            return report;
        }

        if settings.push_enabled {
            self.deliver_push(db, user_id, &survivors, &mut report).await;
        }

        if settings.email_enabled {
            if let Some(to) = settings.notify_email.as_deref() {
                let digest = render_digest(&survivors, summary);
                match &self.email {
                    Some(sender) => match sender.send(to, &digest).await {
                        Ok(channel) => report.email = Some(channel),
                        Err(reason) => {
                            warn!(user_id = user_id, reason = %reason, "Digest email failed");
                            report.warnings.push(reason.as_warning("digest email"));
                        }
                    },
                    None => report.warnings.push(
                        DegradedReason::NotConfigured("email provider").as_warning("digest email"),
                    ),
                }
            }
        }

        info!(
            user_id = user_id,
            delivered = survivors.len(),
            suppressed = report.alerts_suppressed,
            push_sent = report.push_sent,
            push_failed = report.push_failed,
            email = ?report.email,
            "Fan-out finished"
        );
        report.delivered = survivors;
        report
    }

    async fn deliver_push(
        &self,
        db: &Database,
        user_id: &str,
        events: &[AutomationEvent],
        report: &mut FanoutReport,
    ) {
        let subscriptions = match db.list_push_subscriptions(user_id) {
            Ok(subs) => subs,
            Err(e) => {
                warn!(user_id = user_id, error = %e, "Failed to load push subscriptions");
                report.warnings.push(format!("push unavailable: {}", e));
                return;
            }
        };
        if subscriptions.is_empty() {
            return;
        }
        let Some(push) = &self.push else {
            report
                .warnings
                .push(DegradedReason::NotConfigured("push gateway").as_warning("push"));
            return;
        };

        for sub in &subscriptions {
            for event in events {
                match push.send(&sub.endpoint, event).await {
                    Ok(()) => report.push_sent += 1,
                    Err(reason) => {
                        warn!(
                            user_id = user_id,
                            subscription = sub.id,
                            reason = %reason,
                            "Push delivery failed"
                        );
                        report.push_failed += 1;
                    }
                }
            }
        }
        if report.push_failed > 0 {
            report.warnings.push(format!(
                "push: {} of {} deliveries failed",
                report.push_failed,
                report.push_failed + report.push_sent
            ));
        }
    }
}

/// Insert alert rows for events not alerted since `since`
///
/// Returns the events that were inserted and how many were suppressed.
async fn insert_new_alerts(
    db: &Database,
    user_id: &str,
    events: Vec<AutomationEvent>,
    since: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(Vec<AutomationEvent>, usize)> {
    let db = db.clone();
    let user_id = user_id.to_string();
    tokio::task::spawn_blocking(move || -> Result<(Vec<AutomationEvent>, usize)> {
        let mut survivors = Vec::with_capacity(events.len());
        let mut suppressed = 0;
        for event in events {
            if db.recent_alert_exists(&user_id, event.alert_type, &event.title, since)? {
                suppressed += 1;
                continue;
            }
            db.insert_alert(&user_id, &event, now)?;
            survivors.push(event);
        }
        Ok((survivors, suppressed))
    })
    .await?
}
