use colored::Colorize;
use std::time::Duration;
use tokio_postgres::config::SslMode;
use tokio_postgres::tls::MakeTlsConnect;
use tokio_postgres::{Config, NoTls, Socket};
use url::Url;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const APPLICATION_NAME: &str = "supatool";

/// How one connection attempt is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tls,
    Plain,
}

/// Attempts to make for `mode`, in order.
///
/// `sslmode=disable` goes straight to plain TCP; every other mode tries TLS
/// first and keeps plain TCP as the fallback.
pub fn transports(mode: SslMode) -> &'static [Transport] {
    match mode {
        SslMode::Disable => &[Transport::Plain],
        _ => &[Transport::Tls, Transport::Plain],
    }
}

/// Whether a failed TLS attempt should be retried over plain TCP.
pub fn should_retry_without_tls(message: &str) -> bool {
    let m = message.to_lowercase();
    ["ssl", "tls", "certificate", "handshake", "sasl", "scram"]
        .iter()
        .any(|needle| m.contains(needle))
}

/// Broad class of a connection failure, for remediation hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionIssue {
    Dns,
    Authentication,
    Sasl,
    Timeout,
    Other,
}

impl ConnectionIssue {
    pub fn hints(self) -> &'static [&'static str] {
        match self {
            Self::Dns => &[
                "Is your internet connection working?",
                "Is the host in your connection string correct?",
            ],
            Self::Authentication => &[
                "Check the user name and password in your connection string.",
                "Special characters in the password must be URL-encoded.",
            ],
            Self::Sasl => &[
                "Reset the database password in the Supabase dashboard.",
                "URL-encode special characters in the password (e.g. `@` as `%40`).",
                "Make sure the project is not paused.",
            ],
            Self::Timeout => &[
                "The server could not be reached in time.",
                "Check the host, port and any firewall or VPN in between.",
            ],
            Self::Other => &[],
        }
    }
}

/// Classify a connection error by its message.
pub fn diagnose(message: &str) -> ConnectionIssue {
    let m = message.to_lowercase();
    if m.contains("sasl") || m.contains("scram") {
        ConnectionIssue::Sasl
    } else if m.contains("password authentication failed")
        || m.contains("authentication")
        || m.contains("invalid password")
    {
        ConnectionIssue::Authentication
    } else if m.contains("failed to lookup address")
        || m.contains("name or service not known")
        || m.contains("nodename nor servname")
        || m.contains("enotfound")
        || m.contains("no such host")
    {
        ConnectionIssue::Dns
    } else if m.contains("timed out") || m.contains("timeout") {
        ConnectionIssue::Timeout
    } else {
        ConnectionIssue::Other
    }
}

/// `url` with its password replaced by `***`.
pub fn redact(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some("***")).is_err() {
                return "<connection string>".to_string();
            }
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<connection string>".to_string(),
    }
}

/// Reject strings that are not `postgres://` / `postgresql://` URLs.
pub fn validate(url: &str) -> anyhow::Result<()> {
    let parsed = Url::parse(url).map_err(|e| {
        anyhow::anyhow!(
            "invalid connection string ({e}); special characters in the password must be URL-encoded"
        )
    })?;
    match parsed.scheme() {
        "postgres" | "postgresql" => {}
        other => anyhow::bail!("unsupported connection scheme `{other}`: expected postgres:// or postgresql://"),
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        anyhow::bail!("connection string has no host");
    }
    Ok(())
}

enum AttemptError {
    Failed(String),
    TimedOut,
}

pub async fn connect_db(database_url: &str) -> anyhow::Result<tokio_postgres::Client> {
    validate(database_url)?;
    let mut config: Config = database_url
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid connection string {}: {e}", redact(database_url)))?;
    if config.get_application_name().is_none() {
        config.application_name(APPLICATION_NAME);
    }

    let plan = transports(config.get_ssl_mode());
    let mut last = AttemptError::Failed("no connection attempt made".to_string());
    for (i, transport) in plan.iter().enumerate() {
        tracing::debug!(url = %redact(database_url), ?transport, "connecting");
        let attempt = match transport {
            Transport::Tls => {
                config.ssl_mode(SslMode::Require);
                open(&config, tls_connector()?).await
            }
            Transport::Plain => {
                config.ssl_mode(SslMode::Disable);
                open(&config, NoTls).await
            }
        };
        let err = match attempt {
            Ok(client) => {
                if i > 0 {
                    tracing::info!("connected without SSL");
                }
                return Ok(client);
            }
            Err(err) => err,
        };

        let retry = i + 1 < plan.len()
            && matches!(&err, AttemptError::Failed(message) if should_retry_without_tls(message));
        if !retry {
            last = err;
            break;
        }
        if let AttemptError::Failed(message) = &err {
            tracing::warn!(error = %message, "SSL connection failed; retrying without SSL");
        }
        last = err;
    }

    match last {
        AttemptError::Failed(message) => {
            print_hints(diagnose(&message));
            anyhow::bail!("failed to connect to {}: {message}", redact(database_url));
        }
        AttemptError::TimedOut => {
            print_hints(ConnectionIssue::Timeout);
            anyhow::bail!(
                "connection to {} timed out after {}s",
                redact(database_url),
                CONNECT_TIMEOUT.as_secs()
            );
        }
    }
}

/// TLS connector that skips certificate and hostname verification.
fn tls_connector() -> anyhow::Result<postgres_native_tls::MakeTlsConnector> {
    let connector = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to initialise TLS: {e}"))?;
    Ok(postgres_native_tls::MakeTlsConnector::new(connector))
}

async fn open<T>(config: &Config, tls: T) -> Result<tokio_postgres::Client, AttemptError>
where
    T: MakeTlsConnect<Socket>,
    T::Stream: Send + 'static,
{
    let (client, connection) = match tokio::time::timeout(CONNECT_TIMEOUT, config.connect(tls)).await {
        Ok(Ok(pair)) => pair,
        Ok(Err(e)) => return Err(AttemptError::Failed(format!("{:#}", anyhow::Error::from(e)))),
        Err(_) => return Err(AttemptError::TimedOut),
    };

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("postgres connection error: {e}");
        }
    });
    Ok(client)
}

fn print_hints(issue: ConnectionIssue) {
    for hint in issue.hints() {
        eprintln!("{} {hint}", "hint:".yellow().bold());
    }
}
