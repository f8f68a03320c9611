//! Seat bookkeeping and the two guards in front of every mutating ride operation.
//!
//! The storage layer applies the same conditions inside its update statements,
//! these functions are what it falls back on to explain a refusal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ride::Ride, user::User};

/// Never clamped. Lowering the capacity of a ride below its rider count makes this negative.
pub fn spots_left(capacity: i64, num_riders: i64) -> i64 {
    capacity - num_riders
}

pub fn is_owner(user: &User, ride: &Ride) -> bool {
    user.user_id == ride.driver_id
}

pub fn can_signup(user: &User, ride: &Ride) -> bool {
    signup_denial(user, ride).is_none()
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignupDenial {
    #[error("drivers cannot sign up for their own ride")]
    Driver,
    #[error("the ride is full")]
    Full,
}

/// Why `user` may not take a seat on `ride`, if anything. Being the driver wins over the ride being full.
pub fn signup_denial(user: &User, ride: &Ride) -> Option<SignupDenial> {
    if is_owner(user, ride) {
        Some(SignupDenial::Driver)
    } else if ride.is_full() {
        Some(SignupDenial::Full)
    } else {
        None
    }
}
