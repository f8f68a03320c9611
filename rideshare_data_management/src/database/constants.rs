pub const USERS_TABLE_NAME: &str = "Users";
pub const USER_ID: &str = "user_id";
pub const USERNAME: &str = "username";
pub const EMAIL: &str = "email";
pub const API_TOKEN: &str = "api_token";
pub const JOIN_TIME: &str = "join_time";

pub const RIDES_TABLE_NAME: &str = "Rides";
pub const RIDE_ID: &str = "ride_id";
pub const ORIGIN: &str = "origin";
pub const DESTINATION: &str = "destination";
pub const DEPARTURE_TIME: &str = "departure_time";
pub const NOTES: &str = "notes";
pub const CAPACITY: &str = "capacity";
pub const NUM_RIDERS: &str = "num_riders";
pub const DRIVER_ID: &str = "driver_id";

// Alias the driver's username is selected under when rides are joined with users
pub const DRIVER: &str = "driver";
