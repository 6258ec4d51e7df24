use std::sync::Arc;

use attendance_client::config::{ClientConfig, ConfigError};
use attendance_client::net::api::{AttendanceApi, GatewayBuildError, HttpGateway};
use attendance_client::net::types::{AttendanceKind, Credentials, Gender, RegistrationForm, Role, YearLevelRef};
use attendance_client::router::{Navigation, RouteGuard};
use attendance_client::state::attendance::{AttendanceFilters, filter_records};
use attendance_client::state::session::{SessionError, SessionStore};
use attendance_client::state::storage::FileTokenStore;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Gateway(#[from] GatewayBuildError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("{0} is not a known route")]
    UnknownRoute(String),
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "attendance", about = "Event attendance API client")]
struct Cli {
    /// Overrides `ATTENDANCE_API_URL`.
    #[arg(long)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and persist the session token.
    Login(LoginArgs),
    /// Create an account and sign it in.
    Register(RegisterArgs),
    /// Drop the session and the persisted token.
    Logout,
    /// Show the signed-in user.
    Me,
    /// Show the signed-in attendee's QR code.
    Qr,
    /// List attendees (SBO only).
    Attendees,
    /// Record a scan for an attendee (SBO only).
    Scan { attendee_id: i64 },
    /// Show an attendee's QR code (SBO only).
    AttendeeQr { attendee_id: i64 },
    /// Log an attendance slot for the signed-in attendee.
    Log {
        #[arg(long = "type", default_value = "am_in")]
        kind: AttendanceKind,
    },
    /// List attendance records, optionally filtered.
    Records(RecordFilterArgs),
    /// List year levels accepted by registration.
    YearLevels,
    /// Run the navigation guard against a client route.
    Navigate { path: String },
}

#[derive(Args, Debug)]
struct LoginArgs {
    #[arg(long)]
    email: String,
    #[arg(long, env = "ATTENDANCE_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args, Debug)]
struct RegisterArgs {
    #[arg(long)]
    full_name: String,
    #[arg(long)]
    email: String,
    #[arg(long, env = "ATTENDANCE_PASSWORD", hide_env_values = true)]
    password: String,
    /// Defaults to `--password`.
    #[arg(long)]
    password_confirmation: Option<String>,
    #[arg(long)]
    course: String,
    #[arg(long, value_parser = parse_gender)]
    gender: Gender,
    #[arg(long)]
    year_level_id: Option<i64>,
    #[arg(long, value_parser = parse_role, default_value = "Attendee")]
    role: Role,
    /// Only sent for SBO accounts.
    #[arg(long)]
    position: Option<String>,
}

#[derive(Args, Debug)]
struct RecordFilterArgs {
    /// `YYYY-MM-DD`.
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    course: Option<String>,
    #[arg(long, value_parser = parse_role)]
    role: Option<Role>,
    #[arg(long)]
    attended: Option<bool>,
}

impl From<RecordFilterArgs> for AttendanceFilters {
    fn from(args: RecordFilterArgs) -> Self {
        Self {
            date: args.date,
            attendee_name: args.name,
            course: args.course,
            role: args.role,
            has_attended: args.attended,
        }
    }
}

fn parse_role(raw: &str) -> Result<Role, String> {
    match raw.to_ascii_lowercase().as_str() {
        "attendee" => Ok(Role::Attendee),
        "sbo" => Ok(Role::Sbo),
        _ => Err(format!("expected Attendee or SBO, got {raw}")),
    }
}

fn parse_gender(raw: &str) -> Result<Gender, String> {
    match raw.to_ascii_lowercase().as_str() {
        "male" => Ok(Gender::Male),
        "female" => Ok(Gender::Female),
        _ => Err(format!("expected Male or Female, got {raw}")),
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(api_url) = cli.api_url.as_deref() {
        config = config.with_api_url(api_url)?;
    }

    let gateway = Arc::new(HttpGateway::new(&config)?);
    let tokens = Arc::new(FileTokenStore::new(config.token_path.clone()));
    let session = Arc::new(SessionStore::new(gateway, tokens));
    tracing::debug!(api_url = %config.api_url, token_path = %config.token_path.display(), "client ready");

    run(&session, cli.command).await
}

async fn run(session: &Arc<SessionStore>, command: Command) -> Result<(), CliError> {
    let api = session.api();
    match command {
        Command::Login(args) => {
            let response = session.login(&Credentials { email: args.email, password: args.password }).await?;
            print_json(&response)
        }
        Command::Register(args) => {
            let form = RegistrationForm {
                password_confirmation: args.password_confirmation.unwrap_or_else(|| args.password.clone()),
                full_name: args.full_name,
                email: args.email,
                password: args.password,
                course: args.course,
                gender: args.gender,
                year_level_id: args.year_level_id,
                role: args.role,
                position: args.position,
            };
            let response = session.register(&form).await?;
            print_json(&response)
        }
        Command::Logout => {
            session.logout();
            print_json(&json!({ "message": "Logged out" }))
        }
        Command::Me => {
            session.require_token()?;
            session.fetch_user().await.map_err(SessionError::from)?;
            let user = session.user().ok_or(SessionError::NotAuthenticated)?;
            let is_sbo = user.is_sbo();
            let year_level = user.year_level.as_ref().map(YearLevelRef::label).map(str::to_owned);
            print_json(&json!({ "user": user, "is_sbo": is_sbo, "year_level": year_level }))
        }
        Command::Qr => {
            let token = session.require_token()?;
            print_json(&api.my_qr(&token).await.map_err(SessionError::from)?)
        }
        Command::Attendees => {
            let token = session.require_token()?;
            print_json(&api.attendees(&token).await.map_err(SessionError::from)?)
        }
        Command::Scan { attendee_id } => {
            let token = session.require_token()?;
            print_json(&api.scan_attendee(&token, attendee_id).await.map_err(SessionError::from)?)
        }
        Command::AttendeeQr { attendee_id } => {
            let token = session.require_token()?;
            print_json(&api.attendee_qr(&token, attendee_id).await.map_err(SessionError::from)?)
        }
        Command::Log { kind } => {
            let token = session.require_token()?;
            print_json(&api.log_attendance(&token, kind).await.map_err(SessionError::from)?)
        }
        Command::Records(args) => {
            let records = session.fetch_attendance_records().await?;
            let filters = AttendanceFilters::from(args);
            if filters.is_empty() {
                return print_json(&records);
            }
            print_json(&filter_records(&records, &filters))
        }
        Command::YearLevels => print_json(&api.year_levels().await.map_err(SessionError::from)?),
        Command::Navigate { path } => {
            let guard = RouteGuard::new(Arc::clone(session));
            match guard.before_each(&path).await {
                Navigation::Allowed(route) => print_json(&json!({
                    "outcome": "allowed",
                    "route": route.def.name.to_string(),
                    "title": route.def.title,
                    "path": route.path,
                    "id": route.id,
                })),
                Navigation::Redirected { from, to } => {
                    print_json(&json!({ "outcome": "redirected", "from": from, "to": to }))
                }
                Navigation::NotFound(path) => Err(CliError::UnknownRoute(path)),
            }
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
