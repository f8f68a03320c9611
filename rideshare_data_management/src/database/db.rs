use std::path::Path;

use chrono::{DateTime, Utc};
use const_format::concatcp;
use rideshare_lib::{ride::{Ride, RideDetails, RideForm}, user::User};
use sqlx::{query, query_as, query_scalar, sqlite::{SqliteConnectOptions, SqliteJournalMode}, Executor, Pool, Sqlite, SqlitePool};

use crate::DataManagerError;

use super::constants::*;

const RIDE_DETAILS_SELECT: &str = concatcp!(
    "SELECT ", RIDES_TABLE_NAME, ".*, ", USERS_TABLE_NAME, ".", USERNAME, " AS ", DRIVER,
    " FROM ", RIDES_TABLE_NAME,
    " JOIN ", USERS_TABLE_NAME, " ON ", USERS_TABLE_NAME, ".", USER_ID, " = ", RIDES_TABLE_NAME, ".", DRIVER_ID
);

// Newest departure first, later-created rides first on equal departure times
const RIDE_ORDER: &str = concatcp!(" ORDER BY ", DEPARTURE_TIME, " DESC, ", RIDE_ID, " DESC");

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> DataManagerError {
    move |err| DataManagerError::Database(format!("{context}: {err}"))
}

#[derive(Clone)]
pub struct RideDatabase {
    pool: Pool<Sqlite>,
}

impl RideDatabase {
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, DataManagerError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await
                .map_err(|err| DataManagerError::Database(format!("Failed to create data directory {:?}: {err}", parent)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await.map_err(db_error("Failed to connect to database"))?;

        let db = Self {
            pool
        };

        db.init().await?;

        Ok(db)
    }

    pub async fn init(&self) -> Result<(), DataManagerError> {
        self.pool.execute(concatcp!("
            CREATE TABLE IF NOT EXISTS ", USERS_TABLE_NAME, "(",
                USER_ID,   " INTEGER PRIMARY KEY AUTOINCREMENT,",
                USERNAME,  " TEXT NOT NULL UNIQUE,",
                EMAIL,     " TEXT NOT NULL,",
                API_TOKEN, " TEXT NOT NULL UNIQUE,",
                JOIN_TIME, " TIMESTAMP NOT NULL);

            CREATE TABLE IF NOT EXISTS ", RIDES_TABLE_NAME, "(",
                RIDE_ID,        " INTEGER PRIMARY KEY AUTOINCREMENT,",
                ORIGIN,         " TEXT NOT NULL,",
                DESTINATION,    " TEXT NOT NULL,",
                DEPARTURE_TIME, " TIMESTAMP NOT NULL,",
                NOTES,          " TEXT,",
                CAPACITY,       " INTEGER NOT NULL CHECK (", CAPACITY, " > 0),",
                NUM_RIDERS,     " INTEGER NOT NULL DEFAULT 0 CHECK (", NUM_RIDERS, " >= 0),",
                DRIVER_ID,      " INTEGER NOT NULL,
                FOREIGN KEY(", DRIVER_ID, ") REFERENCES ", USERS_TABLE_NAME, "(", USER_ID, ") ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS RidesByDriver ON ", RIDES_TABLE_NAME, "(", DRIVER_ID, ", ", DEPARTURE_TIME, ")"))
            .await
            .map_err(db_error("Failed to create tables"))
            .map(|_| ())
    }

    pub async fn ping(&self) -> Result<(), DataManagerError> {
        query("SELECT 1")
            .execute(&self.pool).await
            .map_err(db_error("Database unreachable"))
            .map(|_| ())
    }

    pub async fn insert_user(&self, username: &str, email: &str, api_token: &str, join_time: DateTime<Utc>) -> Result<User, DataManagerError> {
        let id = query_as::<_, (i64,)>(concatcp!("
            INSERT INTO ", USERS_TABLE_NAME, "(",
            USER_ID, ", ", USERNAME, ", ", EMAIL, ", ", API_TOKEN, ", ", JOIN_TIME, ")
            VALUES (NULL, ?1, ?2, ?3, ?4) RETURNING ", USER_ID))
                .bind(username)
                .bind(email)
                .bind(api_token)
                .bind(join_time)
                .fetch_one(&self.pool).await
                .map_err(|err| match err.as_database_error() {
                    Some(db_err) if db_err.is_unique_violation() => DataManagerError::UsernameTaken(username.to_string()),
                    _ => DataManagerError::Database(format!("Failed to insert user: {err}")),
                })
                .map(|row| row.0)?;

        Ok(User::new(id, username.to_string(), email.to_string(), api_token.to_string(), join_time))
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>, DataManagerError> {
        query_as::<_, User>(concatcp!("SELECT * FROM ", USERS_TABLE_NAME, " WHERE ", USER_ID, " = ?1"))
            .bind(user_id)
            .fetch_optional(&self.pool).await
            .map_err(db_error("Failed to get user"))
    }

    pub async fn get_user_by_name(&self, username: &str) -> Result<Option<User>, DataManagerError> {
        query_as::<_, User>(concatcp!("SELECT * FROM ", USERS_TABLE_NAME, " WHERE ", USERNAME, " = ?1"))
            .bind(username)
            .fetch_optional(&self.pool).await
            .map_err(db_error("Failed to get user"))
    }

    pub async fn get_user_by_token(&self, api_token: &str) -> Result<Option<User>, DataManagerError> {
        query_as::<_, User>(concatcp!("SELECT * FROM ", USERS_TABLE_NAME, " WHERE ", API_TOKEN, " = ?1"))
            .bind(api_token)
            .fetch_optional(&self.pool).await
            .map_err(db_error("Failed to get user"))
    }

    pub async fn get_users(&self) -> Result<Vec<User>, DataManagerError> {
        query_as::<_, User>(concatcp!("SELECT * FROM ", USERS_TABLE_NAME, " ORDER BY ", USER_ID))
            .fetch_all(&self.pool).await
            .map_err(db_error("Failed to get users"))
    }

    /// Returns false if there is no such user.
    pub async fn set_user_token(&self, username: &str, api_token: &str) -> Result<bool, DataManagerError> {
        query(concatcp!("UPDATE ", USERS_TABLE_NAME, " SET ", API_TOKEN, " = ?1 WHERE ", USERNAME, " = ?2"))
            .bind(api_token)
            .bind(username)
            .execute(&self.pool).await
            .map_err(db_error("Failed to set api token"))
            .map(|result| result.rows_affected() > 0)
    }

    /// New rides always start without riders.
    pub async fn insert_ride(&self, driver_id: i64, form: &RideForm) -> Result<Ride, DataManagerError> {
        query_as::<_, Ride>(concatcp!("
            INSERT INTO ", RIDES_TABLE_NAME, "(",
            RIDE_ID, ", ", ORIGIN, ", ", DESTINATION, ", ", DEPARTURE_TIME, ", ", NOTES, ", ", CAPACITY, ", ", NUM_RIDERS, ", ", DRIVER_ID, ")
            VALUES (NULL, ?1, ?2, ?3, ?4, ?5, 0, ?6) RETURNING *"))
                .bind(form.origin.trim())
                .bind(form.destination.trim())
                .bind(form.departure_time)
                .bind(form.notes())
                .bind(form.capacity)
                .bind(driver_id)
                .fetch_one(&self.pool).await
                .map_err(db_error("Failed to insert ride"))
    }

    pub async fn get_ride(&self, ride_id: i64) -> Result<Option<Ride>, DataManagerError> {
        query_as::<_, Ride>(concatcp!("SELECT * FROM ", RIDES_TABLE_NAME, " WHERE ", RIDE_ID, " = ?1"))
            .bind(ride_id)
            .fetch_optional(&self.pool).await
            .map_err(db_error("Failed to get ride"))
    }

    pub async fn get_ride_details(&self, ride_id: i64) -> Result<Option<RideDetails>, DataManagerError> {
        query_as::<_, RideDetails>(concatcp!(RIDE_DETAILS_SELECT, " WHERE ", RIDES_TABLE_NAME, ".", RIDE_ID, " = ?1"))
            .bind(ride_id)
            .fetch_optional(&self.pool).await
            .map_err(db_error("Failed to get ride"))
    }

    pub async fn count_rides(&self) -> Result<i64, DataManagerError> {
        query_scalar::<_, i64>(concatcp!("SELECT COUNT(*) FROM ", RIDES_TABLE_NAME))
            .fetch_one(&self.pool).await
            .map_err(db_error("Failed to count rides"))
    }

    pub async fn get_rides_page(&self, limit: i64, offset: i64) -> Result<Vec<RideDetails>, DataManagerError> {
        query_as::<_, RideDetails>(concatcp!(RIDE_DETAILS_SELECT, RIDE_ORDER, " LIMIT ?1 OFFSET ?2"))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool).await
            .map_err(db_error("Failed to get rides"))
    }

    pub async fn count_driver_rides(&self, driver_id: i64) -> Result<i64, DataManagerError> {
        query_scalar::<_, i64>(concatcp!("SELECT COUNT(*) FROM ", RIDES_TABLE_NAME, " WHERE ", DRIVER_ID, " = ?1"))
            .bind(driver_id)
            .fetch_one(&self.pool).await
            .map_err(db_error("Failed to count rides"))
    }

    pub async fn get_driver_rides_page(&self, driver_id: i64, limit: i64, offset: i64) -> Result<Vec<RideDetails>, DataManagerError> {
        query_as::<_, RideDetails>(concatcp!(RIDE_DETAILS_SELECT, " WHERE ", DRIVER_ID, " = ?1", RIDE_ORDER, " LIMIT ?2 OFFSET ?3"))
            .bind(driver_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool).await
            .map_err(db_error("Failed to get rides"))
    }

    /// Updates the ride only if `driver_id` is its driver. `None` means nothing matched.
    pub async fn update_ride_as_driver(&self, ride_id: i64, driver_id: i64, form: &RideForm) -> Result<Option<Ride>, DataManagerError> {
        query_as::<_, Ride>(concatcp!("
            UPDATE ", RIDES_TABLE_NAME, " SET ",
                ORIGIN, " = ?1, ",
                DESTINATION, " = ?2, ",
                DEPARTURE_TIME, " = ?3, ",
                NOTES, " = ?4, ",
                CAPACITY, " = ?5
            WHERE ", RIDE_ID, " = ?6 AND ", DRIVER_ID, " = ?7 RETURNING *"))
                .bind(form.origin.trim())
                .bind(form.destination.trim())
                .bind(form.departure_time)
                .bind(form.notes())
                .bind(form.capacity)
                .bind(ride_id)
                .bind(driver_id)
                .fetch_optional(&self.pool).await
                .map_err(db_error("Failed to update ride"))
    }

    /// Deletes the ride only if `driver_id` is its driver. Returns whether a row was removed.
    pub async fn delete_ride_as_driver(&self, ride_id: i64, driver_id: i64) -> Result<bool, DataManagerError> {
        query(concatcp!("DELETE FROM ", RIDES_TABLE_NAME, " WHERE ", RIDE_ID, " = ?1 AND ", DRIVER_ID, " = ?2"))
            .bind(ride_id)
            .bind(driver_id)
            .execute(&self.pool).await
            .map_err(db_error("Failed to delete ride"))
            .map(|result| result.rows_affected() > 0)
    }

    /// Takes one seat for `rider_id` in a single statement, so concurrent signups can never push
    /// `num_riders` past `capacity`. `None` means the ride is missing, full, or driven by the rider.
    pub async fn add_rider(&self, ride_id: i64, rider_id: i64) -> Result<Option<Ride>, DataManagerError> {
        query_as::<_, Ride>(concatcp!("
            UPDATE ", RIDES_TABLE_NAME, " SET ", NUM_RIDERS, " = ", NUM_RIDERS, " + 1
            WHERE ", RIDE_ID, " = ?1 AND ", DRIVER_ID, " != ?2 AND ", NUM_RIDERS, " < ", CAPACITY, " RETURNING *"))
                .bind(ride_id)
                .bind(rider_id)
                .fetch_optional(&self.pool).await
                .map_err(db_error("Failed to add rider"))
    }
}
