use serde::{Deserialize, Serialize};

use crate::{ride::Ride, user::User};

pub const SIGNUP_SUBJECT: &str = "Ride Signup Confirmation";

/// An outbound email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub sender: String,
    pub recipients: Vec<String>,
}

impl Notification {
    pub fn new(subject: impl Into<String>, body: impl Into<String>, sender: impl Into<String>, recipients: Vec<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            sender: sender.into(),
            recipients,
        }
    }
}

/// The two emails a successful signup produces: a confirmation for the rider, then a heads-up for the driver.
pub fn signup_notifications(sender: &str, rider: &User, driver: &User, ride: &Ride) -> [Notification; 2] {
    let summary = ride_summary(ride);

    [
        Notification::new(
            SIGNUP_SUBJECT,
            format!("You have successfully signed up for a ride\n\n{summary}"),
            sender,
            vec![rider.email.clone()],
        ),
        Notification::new(
            SIGNUP_SUBJECT,
            format!("{} has signed up for your ride\n\n{summary}", rider.username),
            sender,
            vec![driver.email.clone()],
        ),
    ]
}

fn ride_summary(ride: &Ride) -> String {
    format!(
        "{} -> {}, departing {}",
        ride.origin,
        ride.destination,
        ride.departure_time.format("%Y-%m-%d %H:%M UTC")
    )
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn rider_and_driver_each_get_one_email() {
        let rider = User::new(2, "sam".into(), "sam@example.com".into(), String::new(), Utc::now());
        let driver = User::new(1, "max".into(), "max@example.com".into(), String::new(), Utc::now());
        let ride = Ride {
            ride_id: 5,
            origin: "Waterville".into(),
            destination: "Portland".into(),
            departure_time: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
            notes: None,
            capacity: 4,
            num_riders: 4,
            driver_id: 1,
        };

        let [to_rider, to_driver] = signup_notifications("rides@example.com", &rider, &driver, &ride);

        assert_eq!(to_rider.recipients, vec!["sam@example.com".to_string()]);
        assert_eq!(to_rider.subject, SIGNUP_SUBJECT);
        assert!(to_rider.body.starts_with("You have successfully signed up for a ride"));
        assert!(to_rider.body.contains("Waterville -> Portland, departing 2024-05-01 09:30 UTC"));

        assert_eq!(to_driver.recipients, vec!["max@example.com".to_string()]);
        assert!(to_driver.body.starts_with("sam has signed up for your ride"));
        assert_eq!(to_driver.sender, "rides@example.com");
    }
}
