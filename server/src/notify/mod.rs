//! Signup emails. Requests only enqueue, a background dispatcher does the sending and retrying,
//! so a mail outage never fails or rolls back a signup.

mod dispatcher;
mod mailer;
mod notifier;

pub use dispatcher::{deliver, dispatch, RetryPolicy};
pub use mailer::{HttpMailer, LogMailer, MailError, Mailer};
pub use notifier::Notifier;
