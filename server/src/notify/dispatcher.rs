use std::{sync::Arc, time::Duration};

use rideshare_lib::notification::Notification;
use tokio::{sync::mpsc::UnboundedReceiver, task::JoinSet};

use super::Mailer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    /// Wait before retrying after failed attempt number `attempt` (1-based), doubling each time.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff.saturating_mul(1 << attempt.saturating_sub(1).min(16))
    }
}

/// Sends everything that arrives on `outbox`, each notification on its own task so one slow
/// recipient does not hold up the rest. Returns once every sender is gone and the queue is drained.
pub async fn dispatch<M: Mailer>(mut outbox: UnboundedReceiver<Notification>, mailer: M, policy: RetryPolicy) {
    let mailer = Arc::new(mailer);
    let mut in_flight = JoinSet::new();

    while let Some(notification) = outbox.recv().await {
        let mailer = mailer.clone();
        in_flight.spawn(async move {
            deliver(mailer.as_ref(), &notification, policy).await;
        });

        while in_flight.try_join_next().is_some() {}
    }

    while in_flight.join_next().await.is_some() {}
    tracing::info!("Notification dispatcher stopped");
}

/// Returns whether the notification went out within the policy's attempts. Failures are logged, never returned.
pub async fn deliver<M: Mailer>(mailer: &M, notification: &Notification, policy: RetryPolicy) -> bool {
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match mailer.send(notification).await {
            Ok(()) => {
                tracing::debug!("Sent {:?} to {:?}", notification.subject, notification.recipients);
                return true;
            }
            Err(err) if attempt < max_attempts => {
                let wait = policy.backoff(attempt);
                tracing::warn!("Sending to {:?} failed (attempt {attempt}/{max_attempts}), retrying in {wait:?}: {err}", notification.recipients);
                tokio::time::sleep(wait).await;
            }
            Err(err) => {
                tracing::error!("Giving up on notification to {:?} after {attempt} attempts: {err}", notification.recipients);
            }
        }
    }

    false
}
