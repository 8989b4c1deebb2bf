//! Background push scheduling.
//!
//! While a stage runs we ask an external push service to deliver the
//! "stage complete" message at the moment the stage should end, so the
//! user still hears about it if leaven is closed. The service is optional
//! and best effort: requests travel over a channel to an async worker and
//! failures end up in the log.

use crate::config::PushConfig;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum PushRequest {
    Schedule { at: DateTime<Utc>, message: String },
    CancelPending,
}

#[derive(Serialize)]
struct ScheduleBody<'a> {
    subscription: &'a str,
    scheduled_at: DateTime<Utc>,
    message: &'a str,
}

/// Handle held by the app. A disabled client swallows every request.
#[derive(Debug, Clone, Default)]
pub struct PushClient {
    tx: Option<mpsc::UnboundedSender<PushRequest>>,
}

impl PushClient {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn new(tx: mpsc::UnboundedSender<PushRequest>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    pub fn schedule_in(&self, secs: u64, message: String) {
        let at = i64::try_from(secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|delay| Utc::now().checked_add_signed(delay));
        match at {
            Some(at) => self.send(PushRequest::Schedule { at, message }),
            None => warn!(secs, "push time out of range, not scheduling"),
        }
    }

    pub fn cancel_pending(&self) {
        self.send(PushRequest::CancelPending);
    }

    fn send(&self, request: PushRequest) {
        if let Some(tx) = &self.tx {
            if tx.send(request).is_err() {
                debug!("push worker gone, request dropped");
            }
        }
    }
}

/// Drain requests until every `PushClient` is dropped.
pub async fn run(config: PushConfig, mut rx: mpsc::UnboundedReceiver<PushRequest>) {
    let http = reqwest::Client::new();
    let base = config.endpoint.trim_end_matches('/').to_string();
    info!(endpoint = %base, "push scheduling enabled");

    while let Some(request) = rx.recv().await {
        let result = match &request {
            PushRequest::Schedule { at, message } => {
                let body = ScheduleBody {
                    subscription: &config.subscription,
                    scheduled_at: *at,
                    message,
                };
                http.post(format!("{base}/schedules"))
                    .json(&body)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
            }
            PushRequest::CancelPending => http
                .delete(format!("{base}/schedules/{}", config.subscription))
                .send()
                .await
                .and_then(|r| r.error_for_status()),
        };
        match result {
            Ok(_) => debug!(?request, "push request accepted"),
            Err(e) => warn!("Push request failed: {}", e),
        }
    }
}
