//! The sync workflow: acquire token, normalize list, replace ranges.

use crate::auth::TokenClient;
use crate::config::{Config, Credentials};
use crate::error::SyncError;
use crate::ip_list::{load_ip_list, NormalizedList};
use crate::named_location::{IpNamedLocation, NamedLocationClient, UpdateOutcome};
use reqwest::Client;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// What a completed run did.
#[derive(Debug)]
pub struct SyncReport {
    pub list: NormalizedList,
    pub outcome: UpdateOutcome,
}

/// Build the shared HTTP client.
pub fn http_client(config: &Config) -> Result<Client, SyncError> {
    Client::builder()
        .timeout(Duration::from_millis(config.http.timeout_ms))
        .user_agent(USER_AGENT)
        .build()
        .map_err(SyncError::from)
}

/// Load the input list and build the request body without touching the network.
pub fn prepare(config: &Config) -> Result<(NormalizedList, IpNamedLocation), SyncError> {
    let list = load_ip_list(&config.input.path, config.input.on_invalid)?;
    debug!(cidrs = ?list.cidrs(), "Normalized ranges");
    let location = IpNamedLocation::new(config.display_name(), &list.entries);
    Ok((list, location))
}

/// Run one sync.
///
/// Configuration and credentials are checked before any request is sent.
pub async fn run(config: &Config, credentials: &Credentials) -> Result<SyncReport, SyncError> {
    config.validate()?;
    credentials.validate()?;

    let client = http_client(config)?;

    let token = TokenClient::new(client.clone(), config)
        .acquire_token(credentials)
        .await?;

    let (list, location) = prepare(config)?;

    info!(
        named_location = %config.named_location.id,
        display_name = %location.display_name,
        ranges = location.ip_ranges.len(),
        "Replacing named location ranges"
    );

    let outcome = NamedLocationClient::new(client, config)
        .replace_ranges(&token, &config.named_location.id, &location)
        .await?;

    Ok(SyncReport { list, outcome })
}

/// Write the user-facing result of an update. Returns whether it succeeded.
pub fn print_outcome<W: Write>(outcome: &UpdateOutcome, out: &mut W) -> std::io::Result<bool> {
    match outcome {
        UpdateOutcome::Updated { body, .. } => {
            writeln!(out, "Named Location updated successfully!")?;
            if let Some(body) = body {
                serde_json::to_writer_pretty(&mut *out, body)?;
                writeln!(out)?;
            }
        }
        UpdateOutcome::Rejected { status, body } => {
            writeln!(out, "Error updating Named Location: {}", status.as_u16())?;
            writeln!(out, "{}", body)?;
        }
    }

    Ok(outcome.is_success())
}
