use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rideshare_data_management::{DataManager, DEFAULT_DATABASE_PATH};
use rideshare_lib::page::PageSelector;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "RideCLI")]
#[command(about = "A CLI to manage ride share users and rides", long_about = None)]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "RIDESHARE_DATABASE", default_value = DEFAULT_DATABASE_PATH)]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a user and print their api token
    AddUser { username: String, email: String },
    /// List all users
    Users,
    /// Issue a new api token for a user. The old one stops working
    RotateToken { username: String },
    /// List rides, latest departure first
    Rides {
        /// Page number, or "last"
        #[arg(long, default_value = "1")]
        page: PageSelector,
        /// Only rides driven by this user
        #[arg(long)]
        driver: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let data_manager = DataManager::start(&cli.database).await
        .with_context(|| format!("Failed to open database {:?}", cli.database))?;

    match cli.command {
        Commands::AddUser { username, email } => {
            let user = data_manager.register_user(&username, &email).await?;
            println!("Created user {} with id {}", user.username, user.user_id);
            println!("API token: {}", user.api_token);
        },
        Commands::Users => {
            for user in data_manager.get_users().await? {
                println!("{:>5}  {:<20} {:<30} joined {}", user.user_id, user.username, user.email, user.join_time.format("%Y-%m-%d"));
            }
        },
        Commands::RotateToken { username } => {
            let api_token = data_manager.rotate_api_token(&username).await?;
            println!("New API token for {}: {}", username, api_token);
        },
        Commands::Rides { page, driver } => {
            let page = match driver {
                Some(driver) => data_manager.list_driver_rides(&driver, page).await?,
                None => data_manager.list_rides(page).await?,
            };

            println!("Page {} of {} ({} rides)", page.page, page.num_pages, page.total);
            for ride in page.items {
                println!(
                    "{:>5}  {} -> {}  {}  driver {}  {}/{} riders, {} left",
                    ride.ride.ride_id,
                    ride.ride.origin,
                    ride.ride.destination,
                    ride.ride.departure_time.format("%Y-%m-%d %H:%M"),
                    ride.driver,
                    ride.ride.num_riders,
                    ride.ride.capacity,
                    ride.spots_left,
                );
            }
        },
    }

    Ok(())
}
