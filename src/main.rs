use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use asset_admin::backend::{AuthProvider, RestBackend, RoleStore};
use asset_admin::config::Config;
use asset_admin::db::{create_pool, PgRoleStore};
use asset_admin::services::{AdminTools, ConsoleNotifier};

#[derive(Parser, Debug)]
#[command(name = "asset-admin")]
#[command(author, version, about = "Admin role management for the asset backend", long_about = None)]
struct Cli {
    /// Override log filter
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Report whether the configured session has admin rights
    Check,
    /// Create an admin account, or promote an existing one
    Setup {
        #[arg(long)]
        email: String,
        /// Only used when a new account has to be created
        #[arg(long, env = "ADMIN_PASSWORD", default_value = "", hide_env_values = true)]
        password: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Remove the admin role from an account
    Revoke {
        #[arg(long)]
        email: String,
    },
    /// Bring a user's profile role in line with their role record
    Reconcile {
        #[arg(long)]
        user_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = cli.log_level.clone().unwrap_or_else(|| "asset_admin=info".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::debug!("Using backend at {}", config.backend_url);

    let rest = Arc::new(RestBackend::from_config(&config)?);
    let auth: Arc<dyn AuthProvider> = rest.clone();

    let store: Arc<dyn RoleStore> = match &config.database_url {
        Some(url) => {
            tracing::info!("Using direct database access for role checks");
            let pool = create_pool(url).await.context("Failed to connect to database")?;
            Arc::new(PgRoleStore::new(pool))
        }
        None => rest,
    };

    let tools = AdminTools::new(auth, store, Arc::new(ConsoleNotifier), config.admin());

    let success = match cli.command {
        Commands::Check => {
            let decision = tools.admin_decision().await;
            println!(
                "admin: {} ({:?})",
                if decision.is_admin { "yes" } else { "no" },
                decision.source
            );
            decision.is_admin
        }
        Commands::Setup {
            email,
            password,
            name,
        } => {
            tools
                .setup_admin_user(&email, &password, name.as_deref())
                .await
        }
        Commands::Revoke { email } => tools.revoke_admin_user(&email).await,
        Commands::Reconcile { user_id } => {
            let outcome = tools
                .reconcile_profile(&user_id)
                .await
                .with_context(|| format!("Reconciliation failed for user {}", user_id))?;
            println!("{}: {:?}", user_id, outcome);
            true
        }
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
