//! `SmartTask`: command-line front end for a Supabase-backed task list.
//!
//! Configuration via CLI flags, environment variables, or config file
//! (`~/.config/smarttask/config.toml`). The session is kept on disk between
//! runs, so `login` once and then work with `tasks`.
//!
//! ```bash
//! export SMARTTASK_URL=https://abcd.supabase.co SMARTTASK_ANON_KEY=...
//! cargo run --bin smarttask -- login ada@example.com --password secret1
//! cargo run --bin smarttask -- tasks add "Write report" --description "Q3"
//! cargo run --bin smarttask -- tasks list --page 2
//! ```

use std::path::Path;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

use smarttask::app::{App, AppError};
use smarttask::config::{CliArgs, ClientConfig, Command, TaskCommand};
use smarttask::gateway::RemoteGateway;
use smarttask::gateway::supabase::SupabaseGateway;
use smarttask::route::{Navigation, Route};
use smarttask::tasks::{Pager, TaskDraft};
use smarttask_proto::auth::UserId;
use smarttask_proto::task::TaskId;

/// Failures reported to the user by the binary.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error("invalid id {0:?}: {1}")]
    InvalidId(String, uuid::Error),

    #[error("not logged in; run `smarttask login <email>` first")]
    NotLoggedIn,

    #[error("no such route: {0}")]
    UnknownRoute(String),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    // Load and resolve configuration (CLI args > env > config file > defaults).
    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::from_cli(&cli)
        }
    };

    // Logs go to a file so stdout only carries command output.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    tracing::info!("smarttask starting");

    let Some(command) = cli.command else {
        eprintln!("no command given; see `smarttask --help`");
        return ExitCode::from(2);
    };

    let Some(backend) = config.to_backend_config() else {
        eprintln!(
            "backend not configured: pass --url and --anon-key, set SMARTTASK_URL and \
             SMARTTASK_ANON_KEY, or fill [backend] in the config file"
        );
        return ExitCode::from(2);
    };

    let gateway = match SupabaseGateway::new(backend) {
        Ok(g) => Arc::new(g),
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let pager = Pager::with_rows_per_page(config.rows_per_page).unwrap_or_else(|e| {
        eprintln!("Warning: {e}; using the default page size");
        Pager::default()
    });

    let mut app = App::new(gateway, pager, config.reset_redirect());
    app.start().await;

    let result = run(&mut app, command).await;
    app.dispose();

    tracing::info!("smarttask exiting");
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::warn!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("smarttask.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

async fn run<G: RemoteGateway>(app: &mut App<G>, command: Command) -> Result<(), CliError> {
    match command {
        Command::Signup { email, password } => {
            let user = app.sign_up(&email, &password).await?;
            println!("Account created for {}. Please check your inbox to verify.", user.email);
        }
        Command::Login { email, password } => {
            let user = app.login(&email, &password).await?;
            println!("Welcome {}!", user.email);
        }
        Command::Logout => {
            app.logout().await?;
            println!("Logged out.");
        }
        Command::Whoami => println!("{}", app.welcome_line()),
        Command::ForgotPassword { email } => {
            app.forgot_password(&email).await?;
            println!("Password reset email sent to {email}.");
        }
        Command::ResetPassword { password } => {
            app.reset_password(&password).await?;
            println!("Password updated.");
        }
        Command::Users => {
            require_login(app)?;
            for profile in app.list_users().await? {
                let name = profile.full_name.as_deref().unwrap_or("");
                println!("{}  {:<32} {name}", profile.id, profile.email);
            }
        }
        Command::Tasks { action } => {
            require_login(app)?;
            run_tasks(app, action).await?;
        }
        Command::Open { path } => {
            let route = Route::parse(&path).ok_or(CliError::UnknownRoute(path))?;
            match app.navigate(route) {
                Navigation::Render(to) => println!("render {to}"),
                Navigation::Redirect(to) => println!("redirect {to}"),
                Navigation::Placeholder => println!("loading"),
            }
        }
    }
    Ok(())
}

async fn run_tasks<G: RemoteGateway>(app: &mut App<G>, action: TaskCommand) -> Result<(), CliError> {
    match action {
        TaskCommand::List { page } => {
            app.load_tasks().await?;
            app.go_to_page(page);
            println!("{}", app.welcome_line());
            let view = app.dashboard_page();
            if view.rows.is_empty() {
                println!("No tasks yet.");
            }
            for task in &view.rows {
                println!("{}  {:<12} {}", task.id, task.status.label(), task.title);
            }
            println!("{}", view.label);
        }
        TaskCommand::Add { title, description } => {
            let task = app
                .create_task(TaskDraft { title, description })
                .await?;
            println!("Created {}", task.id);
        }
        TaskCommand::Edit {
            id,
            title,
            description,
            assign,
        } => {
            let id = parse_id::<TaskId>(&id)?;
            let assigned_to = assign.as_deref().map(parse_id::<UserId>).transpose()?;
            let task = app
                .retitle_task(&id, title, description, assigned_to)
                .await?;
            println!("Updated {}", task.id);
        }
        TaskCommand::Status { id, status } => {
            let id = parse_id::<TaskId>(&id)?;
            let task = app.change_status(&id, status).await?;
            println!("{} is now {}", task.id, task.status.label());
        }
        TaskCommand::Rm { id } => {
            let id = parse_id::<TaskId>(&id)?;
            app.delete_task(&id).await?;
            println!("Deleted {id}");
        }
    }
    Ok(())
}

/// Passes only when the dashboard would render for the current session.
fn require_login<G: RemoteGateway>(app: &mut App<G>) -> Result<(), CliError> {
    match app.navigate(Route::Dashboard) {
        Navigation::Render(_) => Ok(()),
        Navigation::Redirect(_) | Navigation::Placeholder => Err(CliError::NotLoggedIn),
    }
}

fn parse_id<T: FromStr<Err = uuid::Error>>(raw: &str) -> Result<T, CliError> {
    T::from_str(raw).map_err(|e| CliError::InvalidId(raw.to_string(), e))
}
