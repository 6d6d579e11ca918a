//! Quickmail Groups - Diagnostic CLI
//!
//! Prints the groups a user can select (or belongs to) in a course as JSON.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use qm_groups::groups::{FerpaPolicy, PgGroupStore, User};
use qm_groups::{config, GroupSelector};

#[derive(Debug, Parser)]
#[command(name = "qm-groups", version, about = "Resolve Quickmail recipient groups")]
struct Args {
    /// Course ID
    #[arg(long)]
    course: i64,

    /// User ID
    #[arg(long)]
    user: i64,

    /// List the groups the user belongs to instead of the selectable ones
    #[arg(long)]
    members_only: bool,

    /// Apply pending database migrations first
    #[arg(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qm_groups=info".into()),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        ferpa = config.ferpa_mode.as_str(),
        flattening = config.group_flattening.as_str(),
        "Starting group lookup"
    );

    let store = PgGroupStore::connect(&config.database_url).await?;
    if args.migrate {
        store.migrate().await?;
    }
    let store = Arc::new(store);

    let course = store
        .get_course(args.course)
        .await?
        .with_context(|| format!("Course {} not found", args.course))?;
    let user = User { id: args.user };

    let selector = GroupSelector::from_host(store, Arc::new(FerpaPolicy::new(config.ferpa_mode)))
        .with_flattening(config.group_flattening);

    let groups = if args.members_only {
        selector.get_course_user_groups(&course, &user, None).await?
    } else {
        selector
            .get_course_user_selectable_groups(&course, &user, None)
            .await?
    };

    println!("{}", serde_json::to_string_pretty(&groups)?);
    Ok(())
}
