use rideshare_data_management::Signup;
use rideshare_lib::{notification::{signup_notifications, Notification}, user::User};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Request-side handle to the notification queue.
#[derive(Clone)]
pub struct Notifier {
    outbox: UnboundedSender<Notification>,
    sender: String,
}

impl Notifier {
    /// `sender` is the From address of every notification. The receiver goes to [`super::dispatch`].
    pub fn new(sender: impl Into<String>) -> (Self, UnboundedReceiver<Notification>) {
        let (outbox, rx) = mpsc::unbounded_channel();
        let notifier = Self {
            outbox,
            sender: sender.into(),
        };
        (notifier, rx)
    }

    /// Queues the rider's confirmation and the driver's alert. Returns how many were queued.
    pub fn notify_signup(&self, rider: &User, signup: &Signup) -> usize {
        let mut queued = 0;
        for notification in signup_notifications(&self.sender, rider, &signup.driver, &signup.ride) {
            match self.outbox.send(notification) {
                Ok(()) => queued += 1,
                Err(err) => tracing::error!("Notification dispatcher is gone, dropping email to {:?}", err.0.recipients),
            }
        }
        queued
    }
}
