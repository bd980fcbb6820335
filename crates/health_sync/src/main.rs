use anyhow::{Context, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use health_sync::runner::yesterday;
use health_sync::storage::{GcsObjectStore, LocalObjectStore, ObjectStore};
use health_sync::{Clients, RunSettings, Runner};
use health_sync_client::auth_code::ConsoleAuthorizationCodeProvider;
use health_sync_client::fitbit::{DEFAULT_EXPIRES_IN, DEFAULT_REDIRECT_URI, DEFAULT_SCOPES, FitbitClient};
use health_sync_client::provider::FITBIT;
use health_sync_client::{Credential, CredentialStore, FileCredentialStore};

#[derive(Parser, Debug)]
#[command(name = "health-sync", version, about = "Export one day of health data to storage")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export a day of data (the default).
    Run {
        /// Day to export as YYYY-MM-DD; yesterday in the configured zone when omitted.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Authorize the fitness tracker interactively and save the token pair.
    Authorize {
        #[arg(long, default_value = DEFAULT_REDIRECT_URI)]
        redirect_uri: String,
        /// Needed on first authorization, when no credential is saved yet.
        #[arg(long, env = "FITBIT_CLIENT_ID")]
        client_id: Option<String>,
        #[arg(long, env = "FITBIT_CLIENT_SECRET", hide_env_values = true)]
        client_secret: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `HEALTH_SYNC_LOG_LEVEL`, then `RUST_LOG`, then `info`.
    let log_env = std::env::var("HEALTH_SYNC_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&log_env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();

    let cli = Cli::parse();
    let settings = RunSettings::from_env().context("reading configuration")?;
    let store = FileCredentialStore::new(&settings.credentials_path);

    match cli.command.unwrap_or(Command::Run { date: None }) {
        Command::Run { date } => run(&settings, &store, date).await,
        Command::Authorize {
            redirect_uri,
            client_id,
            client_secret,
        } => authorize(&settings, &store, &redirect_uri, client_id, client_secret).await,
    }
}

async fn run(
    settings: &RunSettings,
    store: &FileCredentialStore,
    date: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let day = date.unwrap_or_else(|| yesterday(settings.client.timezone));
    let clients = Clients::from_store(settings, store)
        .with_context(|| format!("loading credentials from {}", store.path().display()))?;
    let objects: Box<dyn ObjectStore> = match &settings.gcs {
        Some(gcs) => Box::new(GcsObjectStore::new(gcs, settings.client.timeout)?),
        None => Box::new(LocalObjectStore::new(&settings.data_dir)),
    };

    let mut runner = Runner::new(settings, clients, store, objects.as_ref());
    let report = runner.run(day).await;
    if !report.is_success() {
        bail!(
            "{} step(s) failed for {day}: {}",
            report.failures.len(),
            report.failures.join("; ")
        );
    }
    Ok(())
}

async fn authorize(
    settings: &RunSettings,
    store: &FileCredentialStore,
    redirect_uri: &str,
    client_id: Option<String>,
    client_secret: Option<String>,
) -> anyhow::Result<()> {
    let credential = match (client_id, client_secret) {
        (Some(id), Some(secret)) => Credential::new(id, secret, "", ""),
        (None, None) => store
            .load(FITBIT)
            .context("no saved credential; pass --client-id and --client-secret")?,
        _ => bail!("--client-id and --client-secret must be given together"),
    };
    let mut client = FitbitClient::new(&settings.client, credential)?;
    let api = client.api_mut();
    api.fetch_authorization_code(
        DEFAULT_SCOPES,
        redirect_uri,
        DEFAULT_EXPIRES_IN,
        &ConsoleAuthorizationCodeProvider,
    )
    .await?;
    let credential = api.exchange_authorization_code(redirect_uri).await?;
    store.save(FITBIT, &credential)?;
    tracing::info!(path = %store.path().display(), "fitbit credential saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_is_the_default_command() {
        let cli = Cli::try_parse_from(["health-sync"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn run_accepts_date() {
        let cli = Cli::try_parse_from(["health-sync", "run", "--date", "2021-11-01"]).unwrap();
        match cli.command {
            Some(Command::Run { date }) => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2021, 11, 1));
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["health-sync", "run", "--date", "20211101"]).is_err());
    }

    #[test]
    fn authorize_defaults_to_localhost_redirect() {
        let cli = Cli::try_parse_from(["health-sync", "authorize"]).unwrap();
        match cli.command {
            Some(Command::Authorize { redirect_uri, .. }) => {
                assert_eq!(redirect_uri, DEFAULT_REDIRECT_URI);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
