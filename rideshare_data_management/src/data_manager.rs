use std::path::Path;

use rideshare_lib::{
    page::{Page, PageSelector, DRIVER_RIDES_PER_PAGE, RIDES_PER_PAGE},
    ride::{Ride, RideDetails, RideForm},
    rules,
    user::User,
};

use crate::{database::db::RideDatabase, DataManagerError};

/// A seat taken on a ride, along with the driver who has to be told about it.
#[derive(Debug, Clone)]
pub struct Signup {
    pub ride: Ride,
    pub driver: User,
}

const SIGNUP_ATTEMPTS: u32 = 2;

#[derive(Clone)]
pub struct DataManager {
    pub(crate) database: RideDatabase,
}

/// The public interface for all ride share data management.
///
/// Every operation takes the acting user explicitly. Ownership and seat checks are folded into
/// the storage statements, the rules in [`rideshare_lib::rules`] only classify a refusal afterwards.
impl DataManager {
    pub async fn start(database_path: impl AsRef<Path>) -> Result<Self, DataManagerError> {
        let database = RideDatabase::connect(database_path).await?;

        Ok(DataManager {
            database,
        })
    }

    pub async fn ping(&self) -> Result<(), DataManagerError> {
        self.database.ping().await
    }

    pub async fn register_user(&self, username: &str, email: &str) -> Result<User, DataManagerError> {
        let user = self.database.insert_user(username, email, &generate_api_token(), chrono::Utc::now()).await?;
        tracing::info!("Registered user {} ({})", user.username, user.user_id);
        Ok(user)
    }

    pub async fn rotate_api_token(&self, username: &str) -> Result<String, DataManagerError> {
        let api_token = generate_api_token();
        if !self.database.set_user_token(username, &api_token).await? {
            return Err(DataManagerError::NotFound(format!("user {username:?}")));
        }
        tracing::info!("Rotated api token of {}", username);
        Ok(api_token)
    }

    pub async fn get_users(&self) -> Result<Vec<User>, DataManagerError> {
        self.database.get_users().await
    }

    /// Resolves an api token to its user. Unknown tokens give `None`.
    pub async fn authenticate(&self, api_token: &str) -> Result<Option<User>, DataManagerError> {
        self.database.get_user_by_token(api_token).await
    }

    pub async fn get_user_by_name(&self, username: &str) -> Result<User, DataManagerError> {
        self.database.get_user_by_name(username).await?
            .ok_or_else(|| DataManagerError::NotFound(format!("user {username:?}")))
    }

    /// The acting user becomes the driver, and the ride starts with no riders.
    pub async fn create_ride(&self, driver: &User, form: &RideForm) -> Result<Ride, DataManagerError> {
        form.validate()?;
        let ride = self.database.insert_ride(driver.user_id, form).await?;
        tracing::info!("{} created ride {} from {} to {}", driver.username, ride.ride_id, ride.origin, ride.destination);
        Ok(ride)
    }

    pub async fn get_ride(&self, ride_id: i64) -> Result<RideDetails, DataManagerError> {
        self.database.get_ride_details(ride_id).await?
            .ok_or_else(|| ride_not_found(ride_id))
    }

    pub async fn list_rides(&self, page: PageSelector) -> Result<Page<RideDetails>, DataManagerError> {
        let total = self.database.count_rides().await?;
        let window = page.resolve(total, RIDES_PER_PAGE)?;
        let rides = self.database.get_rides_page(window.limit, window.offset).await?;
        Ok(Page::new(rides, window, total))
    }

    /// Rides driven by `username`. An unknown user is not found even though they would have no rides.
    pub async fn list_driver_rides(&self, username: &str, page: PageSelector) -> Result<Page<RideDetails>, DataManagerError> {
        let driver = self.get_user_by_name(username).await?;
        let total = self.database.count_driver_rides(driver.user_id).await?;
        let window = page.resolve(total, DRIVER_RIDES_PER_PAGE)?;
        let rides = self.database.get_driver_rides_page(driver.user_id, window.limit, window.offset).await?;
        Ok(Page::new(rides, window, total))
    }

    pub async fn update_ride(&self, user: &User, ride_id: i64, form: &RideForm) -> Result<Ride, DataManagerError> {
        form.validate()?;

        match self.database.update_ride_as_driver(ride_id, user.user_id, form).await? {
            Some(ride) => {
                tracing::info!("{} updated ride {}", user.username, ride_id);
                Ok(ride)
            }
            None => Err(self.ownership_refusal(user, ride_id).await),
        }
    }

    pub async fn delete_ride(&self, user: &User, ride_id: i64) -> Result<(), DataManagerError> {
        if self.database.delete_ride_as_driver(ride_id, user.user_id).await? {
            tracing::info!("{} deleted ride {}", user.username, ride_id);
            Ok(())
        } else {
            Err(self.ownership_refusal(user, ride_id).await)
        }
    }

    /// The read-only eligibility check behind the signup confirmation view.
    pub async fn check_signup(&self, user: &User, ride_id: i64) -> Result<RideDetails, DataManagerError> {
        let details = self.get_ride(ride_id).await?;
        match rules::signup_denial(user, &details.ride) {
            Some(denial) => Err(DataManagerError::SignupDenied(denial)),
            None => Ok(details),
        }
    }

    /// Takes one seat on the ride for `user`.
    pub async fn sign_up(&self, user: &User, ride_id: i64) -> Result<Signup, DataManagerError> {
        let mut attempts = 0;
        let ride = loop {
            attempts += 1;
            if let Some(ride) = self.database.add_rider(ride_id, user.user_id).await? {
                break ride;
            }

            let ride = self.database.get_ride(ride_id).await?
                .ok_or_else(|| ride_not_found(ride_id))?;

            if let Some(denial) = rules::signup_denial(user, &ride) {
                tracing::warn!("Refused signup of {} for ride {}: {}", user.username, ride_id, denial);
                return Err(DataManagerError::SignupDenied(denial));
            }

            // A seat opened up between the update and the read
            if attempts >= SIGNUP_ATTEMPTS {
                return Err(DataManagerError::Database(format!("Ride {ride_id} kept changing while signing up")));
            }
            tracing::debug!("Ride {} changed while {} was signing up, retrying", ride_id, user.username);
        };

        tracing::info!("{} signed up for ride {} ({}/{})", user.username, ride_id, ride.num_riders, ride.capacity);

        let driver = self.database.get_user(ride.driver_id).await?
            .ok_or_else(|| DataManagerError::NotFound(format!("driver {}", ride.driver_id)))?;

        Ok(Signup {
            ride,
            driver,
        })
    }

    // Explains why an edit or delete scoped to the driver touched nothing
    async fn ownership_refusal(&self, user: &User, ride_id: i64) -> DataManagerError {
        match self.database.get_ride(ride_id).await {
            Ok(Some(ride)) if !rules::is_owner(user, &ride) => {
                tracing::warn!("{} tried to change ride {} driven by user {}", user.username, ride_id, ride.driver_id);
                DataManagerError::PermissionDenied
            }
            Ok(Some(_)) => DataManagerError::Database(format!("Ride {ride_id} changed concurrently")),
            Ok(None) => ride_not_found(ride_id),
            Err(err) => err,
        }
    }
}

fn ride_not_found(ride_id: i64) -> DataManagerError {
    DataManagerError::NotFound(format!("ride {ride_id}"))
}

fn generate_api_token() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rideshare_lib::rules::SignupDenial;
    use tempfile::TempDir;

    use super::*;

    async fn start() -> (TempDir, DataManager) {
        let dir = TempDir::new().unwrap();
        let data_manager = DataManager::start(dir.path().join("rides.db")).await.unwrap();
        (dir, data_manager)
    }

    fn form(capacity: i64) -> RideForm {
        RideForm {
            origin: "Waterville".into(),
            destination: "Portland".into(),
            departure_time: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            notes: Some("Meet at the library".into()),
            capacity,
        }
    }

    async fn ride_with_riders(data_manager: &DataManager, driver: &User, capacity: i64, riders: i64) -> Ride {
        let ride = data_manager.create_ride(driver, &form(capacity)).await.unwrap();
        for i in 0..riders {
            let rider = data_manager.register_user(&format!("filler{}_{i}", ride.ride_id), "filler@example.com").await.unwrap();
            data_manager.sign_up(&rider, ride.ride_id).await.unwrap();
        }
        data_manager.get_ride(ride.ride_id).await.unwrap().ride
    }

    #[tokio::test]
    async fn create_sets_driver_and_zero_riders() {
        let (_dir, dm) = start().await;
        let max = dm.register_user("max", "max@example.com").await.unwrap();

        let ride = dm.create_ride(&max, &form(4)).await.unwrap();
        assert_eq!(ride.driver_id, max.user_id);
        assert_eq!(ride.num_riders, 0);
        assert_eq!(ride.notes.as_deref(), Some("Meet at the library"));

        let details = dm.get_ride(ride.ride_id).await.unwrap();
        assert_eq!(details.driver, "max");
        assert_eq!(details.spots_left, 4);
    }

    #[tokio::test]
    async fn invalid_form_is_rejected() {
        let (_dir, dm) = start().await;
        let max = dm.register_user("max", "max@example.com").await.unwrap();

        let err = dm.create_ride(&max, &form(0)).await.unwrap_err();
        assert!(matches!(err, DataManagerError::InvalidRide(_)));
    }

    #[tokio::test]
    async fn usernames_are_unique_and_tokens_resolve() {
        let (_dir, dm) = start().await;
        let max = dm.register_user("max", "max@example.com").await.unwrap();
        assert_eq!(max.api_token.len(), 32);

        let err = dm.register_user("max", "other@example.com").await.unwrap_err();
        assert!(matches!(err, DataManagerError::UsernameTaken(_)));

        let found = dm.authenticate(&max.api_token).await.unwrap().unwrap();
        assert_eq!(found.user_id, max.user_id);
        assert!(dm.authenticate("nope").await.unwrap().is_none());

        let rotated = dm.rotate_api_token("max").await.unwrap();
        assert!(dm.authenticate(&max.api_token).await.unwrap().is_none());
        assert!(dm.authenticate(&rotated).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn signup_takes_exactly_one_seat() {
        let (_dir, dm) = start().await;
        let max = dm.register_user("max", "max@example.com").await.unwrap();
        let sam = dm.register_user("sam", "sam@example.com").await.unwrap();
        let ride = ride_with_riders(&dm, &max, 4, 3).await;

        let signup = dm.sign_up(&sam, ride.ride_id).await.unwrap();
        assert_eq!(signup.ride.num_riders, 4);
        assert_eq!(signup.driver.user_id, max.user_id);
        assert_eq!(dm.get_ride(ride.ride_id).await.unwrap().spots_left, 0);
    }

    #[tokio::test]
    async fn full_ride_refuses_signup_and_keeps_count() {
        let (_dir, dm) = start().await;
        let max = dm.register_user("max", "max@example.com").await.unwrap();
        let sam = dm.register_user("sam", "sam@example.com").await.unwrap();
        let ride = ride_with_riders(&dm, &max, 4, 4).await;

        let err = dm.sign_up(&sam, ride.ride_id).await.unwrap_err();
        assert!(matches!(err, DataManagerError::SignupDenied(SignupDenial::Full)));
        assert_eq!(dm.get_ride(ride.ride_id).await.unwrap().ride.num_riders, 4);
    }

    #[tokio::test]
    async fn driver_cannot_sign_up_for_own_ride() {
        let (_dir, dm) = start().await;
        let max = dm.register_user("max", "max@example.com").await.unwrap();
        let ride = dm.create_ride(&max, &form(4)).await.unwrap();

        let err = dm.sign_up(&max, ride.ride_id).await.unwrap_err();
        assert!(matches!(err, DataManagerError::SignupDenied(SignupDenial::Driver)));
        assert!(matches!(dm.check_signup(&max, ride.ride_id).await, Err(DataManagerError::SignupDenied(SignupDenial::Driver))));
        assert_eq!(dm.get_ride(ride.ride_id).await.unwrap().ride.num_riders, 0);
    }

    #[tokio::test]
    async fn signup_for_missing_ride_is_not_found() {
        let (_dir, dm) = start().await;
        let sam = dm.register_user("sam", "sam@example.com").await.unwrap();

        assert!(matches!(dm.sign_up(&sam, 99).await, Err(DataManagerError::NotFound(_))));
    }

    #[tokio::test]
    async fn concurrent_signups_never_overbook() {
        let (_dir, dm) = start().await;
        let max = dm.register_user("max", "max@example.com").await.unwrap();
        let ride = ride_with_riders(&dm, &max, 4, 3).await;

        let mut riders = Vec::new();
        for i in 0..8 {
            riders.push(dm.register_user(&format!("rider{i}"), "rider@example.com").await.unwrap());
        }

        let handles: Vec<_> = riders.into_iter()
            .map(|rider| {
                let dm = dm.clone();
                let ride_id = ride.ride_id;
                tokio::spawn(async move { dm.sign_up(&rider, ride_id).await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(DataManagerError::SignupDenied(SignupDenial::Full)) => {}
                Err(err) => panic!("unexpected error: {err}"),
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(dm.get_ride(ride.ride_id).await.unwrap().ride.num_riders, 4);
    }

    #[tokio::test]
    async fn signups_racing_a_capacity_raise_are_never_storage_errors() {
        let (_dir, dm) = start().await;
        let max = dm.register_user("max", "max@example.com").await.unwrap();
        let ride = ride_with_riders(&dm, &max, 1, 1).await;

        let mut riders = Vec::new();
        for i in 0..6 {
            riders.push(dm.register_user(&format!("rider{i}"), "rider@example.com").await.unwrap());
        }

        let raise = {
            let dm = dm.clone();
            let max = max.clone();
            let ride_id = ride.ride_id;
            tokio::spawn(async move { dm.update_ride(&max, ride_id, &form(4)).await })
        };
        let handles: Vec<_> = riders.into_iter()
            .map(|rider| {
                let dm = dm.clone();
                let ride_id = ride.ride_id;
                tokio::spawn(async move { dm.sign_up(&rider, ride_id).await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(DataManagerError::SignupDenied(SignupDenial::Full)) => {}
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
        raise.await.unwrap().unwrap();

        let after = dm.get_ride(ride.ride_id).await.unwrap().ride;
        assert!(winners <= 3);
        assert_eq!(after.num_riders, 1 + winners);
        assert_eq!(after.capacity, 4);

        // Seats the race left open are still takeable
        let late = dm.register_user("late", "late@example.com").await.unwrap();
        let result = dm.sign_up(&late, ride.ride_id).await;
        if winners < 3 {
            assert_eq!(result.unwrap().ride.num_riders, 2 + winners);
        } else {
            assert!(matches!(result, Err(DataManagerError::SignupDenied(SignupDenial::Full))));
        }
    }

    #[tokio::test]
    async fn only_the_driver_edits_and_deletes() {
        let (_dir, dm) = start().await;
        let max = dm.register_user("max", "max@example.com").await.unwrap();
        let sam = dm.register_user("sam", "sam@example.com").await.unwrap();
        let ride = dm.create_ride(&max, &form(4)).await.unwrap();
        let sams_ride = dm.create_ride(&sam, &form(2)).await.unwrap();

        let mut edit = form(6);
        edit.destination = "Boston".into();

        assert!(matches!(dm.update_ride(&sam, ride.ride_id, &edit).await, Err(DataManagerError::PermissionDenied)));
        assert!(matches!(dm.delete_ride(&max, sams_ride.ride_id).await, Err(DataManagerError::PermissionDenied)));
        assert_eq!(dm.get_ride(sams_ride.ride_id).await.unwrap().ride, sams_ride);

        let updated = dm.update_ride(&max, ride.ride_id, &edit).await.unwrap();
        assert_eq!(updated.destination, "Boston");
        assert_eq!(updated.capacity, 6);
        assert_eq!(updated.driver_id, max.user_id);

        dm.delete_ride(&max, ride.ride_id).await.unwrap();
        assert!(matches!(dm.get_ride(ride.ride_id).await, Err(DataManagerError::NotFound(_))));
        assert!(matches!(dm.delete_ride(&max, ride.ride_id).await, Err(DataManagerError::NotFound(_))));
    }

    #[tokio::test]
    async fn listing_is_newest_departure_first_and_paged() {
        let (_dir, dm) = start().await;
        let max = dm.register_user("max", "max@example.com").await.unwrap();
        let sam = dm.register_user("sam", "sam@example.com").await.unwrap();
        let start_time = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();

        for i in 0..30 {
            let mut ride = form(3);
            ride.departure_time = start_time + Duration::hours((i * 7) % 30);
            let driver = if i % 2 == 0 { &max } else { &sam };
            dm.create_ride(driver, &ride).await.unwrap();
        }

        let first = dm.list_rides(PageSelector::default()).await.unwrap();
        assert_eq!(first.items.len(), 25);
        assert_eq!(first.total, 30);
        assert_eq!(first.num_pages, 2);
        assert!(first.has_next);

        let last = dm.list_rides(PageSelector::Last).await.unwrap();
        assert_eq!(last.items.len(), 5);

        let times: Vec<_> = first.items.iter().chain(last.items.iter()).map(|r| r.ride.departure_time).collect();
        assert!(times.windows(2).all(|pair| pair[0] >= pair[1]));

        let maxs = dm.list_driver_rides("max", PageSelector::Number(2)).await.unwrap();
        assert_eq!(maxs.items.len(), 3);
        assert_eq!(maxs.num_pages, 5);
        assert!(maxs.items.iter().all(|r| r.driver == "max"));

        assert!(matches!(dm.list_rides(PageSelector::Number(3)).await, Err(DataManagerError::Page(_))));
        assert!(matches!(dm.list_driver_rides("nobody", PageSelector::default()).await, Err(DataManagerError::NotFound(_))));
    }
}
