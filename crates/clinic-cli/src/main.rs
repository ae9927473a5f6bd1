//! clinic - command-line access to the clinic-management API.
//!
//! Logs in against the backend, keeps the token pair in the configured token
//! store, and issues authenticated requests that renew the access token
//! transparently.

use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clinic_core::api::{ApiClient, ApiError};
use clinic_core::Config;
use serde_json::Value;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "\
Usage: clinic <command> [args]

Commands:
  login [username]       Log in and store the token pair
  logout                 Revoke the refresh token and clear stored tokens
  status                 Show backend URL, token backend and session state
  get <path>             GET an API path and print the JSON response
  post <path> <json>     POST a JSON body to an API path
  delete <path>          DELETE an API path
  patients | appointments | doctors | specialties | notifications
                         List a collection

Environment:
  CLINIC_API_URL         Override the backend base URL
  CLINIC_TOKEN_BACKEND   keyring | file | memory
  RUST_LOG               Log filter (default: warn)";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr; when `log_file` is configured they are also written to
/// a daily-rolling file. The returned guard must live until exit so buffered
/// file output is flushed.
fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let prefix = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "clinic.log".to_string());
            let appender = tracing_appender::rolling::daily(dir, prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = config.apply_env() {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    let _guard = init_tracing(config.log_file.as_deref());

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&mut config, &args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<ApiError>() {
                Some(ApiError::SessionExpired) => {
                    eprintln!(
                        "Session expired. Run `clinic login` to sign in again (entry point: {}).",
                        config.login_route
                    );
                }
                Some(ApiError::Domain { status, body }) => {
                    eprintln!("Error: request failed with status {}", status);
                    print_json(&domain_body_json(body));
                }
                _ => eprintln!("Error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

fn domain_body_json(body: &clinic_core::api::ErrorBody) -> Value {
    match body.as_json() {
        Some(value) => value.clone(),
        None => Value::String(body.to_string()),
    }
}

async fn run(config: &mut Config, args: &[String]) -> Result<()> {
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let store = config.token_store()?;
    let client = ApiClient::from_config(config, store)?.on_session_expired(|route| {
        debug!(route = route, "Session terminated");
    });
    debug!(command = %command, base_url = %client.base_url(), "Running command");

    match command.as_str() {
        "login" => login(config, &client, args.get(1).cloned()).await,
        "logout" => {
            client.logout().await;
            println!("Logged out.");
            Ok(())
        }
        "status" => {
            println!("API:      {}", client.base_url());
            println!("Tokens:   {:?}", config.token_backend);
            if let Some(ref user) = config.last_username {
                println!("User:     {}", user);
            }
            println!(
                "Session:  {}",
                if client.is_authenticated() { "authenticated" } else { "not logged in" }
            );
            Ok(())
        }
        "get" => {
            let path = required(args, 1, "path")?;
            let value: Value = client.get(path).await?;
            print_json(&value);
            Ok(())
        }
        "post" => {
            let path = required(args, 1, "path")?;
            let raw = required(args, 2, "json body")?;
            let body: Value = serde_json::from_str(raw).context("Body is not valid JSON")?;
            let value: Value = client.post(path, &body).await?;
            print_json(&value);
            Ok(())
        }
        "delete" => {
            let path = required(args, 1, "path")?;
            client.delete(path).await?;
            println!("Deleted {}", path);
            Ok(())
        }
        "patients" => print_list(client.fetch_patients().await?),
        "appointments" => print_list(client.fetch_appointments().await?),
        "doctors" => print_list(client.fetch_doctors().await?),
        "specialties" => print_list(client.fetch_specialties().await?),
        "notifications" => print_list(client.fetch_notifications().await?),
        "-h" | "--help" | "help" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => Err(anyhow::anyhow!("Unknown command: {}\n\n{}", other, USAGE)),
    }
}

async fn login(config: &mut Config, client: &ApiClient, username: Option<String>) -> Result<()> {
    let username = match username.or_else(|| config.last_username.clone()) {
        Some(name) => name,
        None => prompt("Username: ")?,
    };
    let password = rpassword::prompt_password(format!("Password for {}: ", username))
        .context("Failed to read password")?;

    client.login(&username, &password).await?;

    config.last_username = Some(username.clone());
    config.save().context("Failed to save config")?;
    info!(username = %username, "Session started");
    println!("Logged in as {}.", username);
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let value = line.trim().to_string();
    if value.is_empty() {
        return Err(anyhow::anyhow!("A username is required"));
    }
    Ok(value)
}

fn required<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("Missing argument: <{}>\n\n{}", name, USAGE))
}

fn print_list<T: serde::Serialize>(items: Vec<T>) -> Result<()> {
    let value = serde_json::to_value(&items)?;
    print_json(&value);
    eprintln!("{} item(s)", items.len());
    Ok(())
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{}", value),
    }
}
