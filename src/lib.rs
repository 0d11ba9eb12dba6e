//! Named Location Sync.
//!
//! Pushes a plain-text list of known-threat IP addresses into a Microsoft
//! Entra ID conditional-access IP named location, so that access policies
//! can block it.
//!
//! # Workflow
//!
//! - **Token** - OAuth2 client-credentials grant against the tenant's token endpoint
//! - **Normalize** - One IP or CIDR per line; bare addresses become host routes
//! - **Replace** - A single PATCH overwrites the named location's `ipRanges`
//!
//! Transient HTTP failures (429, 5xx, timeouts) are retried with exponential
//! backoff. Invalid lines are skipped with a warning or abort the run,
//! depending on `input.on_invalid`.
//!
//! # Example Configuration
//!
//! ```yaml
//! named_location:
//!   id: "0282fa9f-d415-42f8-b491-9b88f8419ca6"
//!
//! input:
//!   path: "arc-known-threats.txt"
//!   on_invalid: skip
//! ```
//!
//! Credentials come from `GRAPH_TENANT_ID`, `GRAPH_CLIENT_ID` and
//! `GRAPH_CLIENT_SECRET`.

pub mod auth;
pub mod config;
pub mod error;
pub mod ip_list;
pub mod named_location;
pub mod retry;
pub mod sync;

pub use config::{Config, Credentials, InvalidEntryPolicy};
pub use error::SyncError;
pub use named_location::UpdateOutcome;
