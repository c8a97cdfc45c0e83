use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use boxoffice_core::catalog::{CatalogClient, NewBooking};
use boxoffice_core::config::load_config;
use boxoffice_core::paths::default_config_dir;
use boxoffice_core::probe::probe;
use boxoffice_core::transport::UreqTransport;
use boxoffice_core::{
    AuthError, AuthMode, ClientConfig, Credentials, RegisterData, SessionManager, SessionStatus,
};

#[derive(Parser, Debug)]
#[command(name = "boxoffice", author, version, about)]
struct Args {
    /// Directory holding config.json, storage.json and cookies.json.
    #[arg(long, global = true, env = "BOXOFFICE_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// API base URL, overrides the config file.
    #[arg(long, global = true, env = "BOXOFFICE_BASE_URL")]
    base_url: Option<String>,

    /// Auth handshake: csrf-cookie or bearer.
    #[arg(long, global = true, env = "BOXOFFICE_MODE")]
    mode: Option<AuthMode>,

    /// Write an HTTP wire log to this directory.
    #[arg(long, global = true, env = "BOXOFFICE_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and remember the session.
    Login {
        #[arg(long, env = "BOXOFFICE_EMAIL")]
        email: String,
        #[arg(long, env = "BOXOFFICE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in with it.
    Register {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: String,
        #[arg(long, env = "BOXOFFICE_PASSWORD", hide_env_values = true)]
        password: String,
        /// Defaults to the password.
        #[arg(long)]
        password_confirmation: Option<String>,
    },
    /// End the session on the server and forget it locally.
    Logout,
    /// Restore the saved session and print who it belongs to.
    Whoami,
    /// Check that the API answers, without credentials.
    Probe {
        #[arg(long)]
        path: Option<String>,
    },
    /// List movies, or show one.
    Movies {
        #[arg(long)]
        id: Option<u64>,
    },
    Studios,
    Bookings,
    /// Sell seats for a schedule.
    Book {
        #[arg(long)]
        schedule: u64,
        /// Repeat for each seat, e.g. --seat A1 --seat A2.
        #[arg(long = "seat", required = true)]
        seats: Vec<String>,
        #[arg(long)]
        customer: Option<String>,
        #[arg(long)]
        payment: Option<String>,
    },
}

fn resolve_config(args: &Args, dir: &Path) -> Result<ClientConfig, Box<dyn Error>> {
    let mut config = load_config(dir)?;
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(log_dir) = &args.log_dir {
        config.log_dir = Some(log_dir.clone());
    }
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_session(config: &ClientConfig, dir: &Path) -> Result<Arc<SessionManager>, Box<dyn Error>> {
    Ok(Arc::new(SessionManager::open(config, dir)?))
}

/// Catalog commands restore the saved session first and bail out when there
/// is none.
fn open_catalog(config: &ClientConfig, dir: &Path) -> Result<CatalogClient, Box<dyn Error>> {
    let manager = open_session(config, dir)?;
    if manager.check_auth() != SessionStatus::Authenticated {
        return Err("Not signed in. Run `boxoffice login` first.".into());
    }
    Ok(CatalogClient::new(manager, config.endpoints.clone()))
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config_dir = match &args.config_dir {
        Some(dir) => dir.clone(),
        None => default_config_dir()?,
    };
    std::fs::create_dir_all(&config_dir)?;

    let config = resolve_config(&args, &config_dir)?;
    log::debug!(
        "Using {} ({} mode), config in {}",
        config.base_url,
        config.mode,
        config_dir.display()
    );

    match args.command {
        Command::Probe { path } => {
            let path = path.as_deref().unwrap_or(config.endpoints.probe.as_str());
            let transport = UreqTransport::new(config.base_url.clone());
            let report = probe(&transport, path);
            print_json(&report)?;
            if !report.is_healthy() {
                return Err(format!("{} is not healthy", config.base_url).into());
            }
        }
        Command::Login { email, password } => {
            let manager = open_session(&config, &config_dir)?;
            let response = manager.login(&Credentials::new(email, password))?;
            if let Some(message) = &response.message {
                log::info!("{}", message);
            }
            print_json(&manager.snapshot())?;
        }
        Command::Register {
            name,
            email,
            password,
            password_confirmation,
        } => {
            let manager = open_session(&config, &config_dir)?;
            let data = RegisterData {
                name,
                email,
                password_confirmation: Some(password_confirmation.unwrap_or_else(|| password.clone())),
                password,
                ..Default::default()
            };
            manager.register(&data)?;
            print_json(&manager.snapshot())?;
        }
        Command::Logout => {
            let manager = open_session(&config, &config_dir)?;
            manager.check_auth();
            match manager.logout() {
                Ok(()) => println!("Signed out."),
                // Local state is already gone; the server just didn't agree.
                Err(e) => log::warn!("Signed out locally: {}", e.user_message()),
            }
        }
        Command::Whoami => {
            let manager = open_session(&config, &config_dir)?;
            manager.check_auth();
            print_json(&manager.snapshot())?;
        }
        Command::Movies { id } => {
            let catalog = open_catalog(&config, &config_dir)?;
            match id {
                Some(id) => print_json(&catalog.get_movie(id)?)?,
                None => print_json(&catalog.list_movies()?)?,
            }
        }
        Command::Studios => {
            let catalog = open_catalog(&config, &config_dir)?;
            print_json(&catalog.list_studios()?)?;
        }
        Command::Bookings => {
            let catalog = open_catalog(&config, &config_dir)?;
            print_json(&catalog.list_bookings()?)?;
        }
        Command::Book {
            schedule,
            seats,
            customer,
            payment,
        } => {
            let catalog = open_catalog(&config, &config_dir)?;
            let booking = catalog.create_booking(&NewBooking {
                schedule_id: schedule,
                seats,
                customer_name: customer,
                payment_method: payment,
            })?;
            print_json(&booking)?;
        }
    }

    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        let message = match e.downcast_ref::<AuthError>() {
            Some(auth) => auth.user_message(),
            None => e.to_string(),
        };
        eprintln!("error: {}", message);
        std::process::exit(1);
    }
}
