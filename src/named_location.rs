//! Graph conditional-access named location updates.

use crate::auth::AccessToken;
use crate::config::Config;
use crate::error::{is_transient_status, SyncError};
use crate::ip_list::CidrEntry;
use crate::retry::{parse_retry_after, retry_with_backoff, Attempt, RetryPolicy};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, info};

const IP_NAMED_LOCATION_TYPE: &str = "#microsoft.graph.ipNamedLocation";
const IPV4_RANGE_TYPE: &str = "#microsoft.graph.iPv4CidrRange";
const IPV6_RANGE_TYPE: &str = "#microsoft.graph.iPv6CidrRange";

/// One entry of `ipRanges`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IpRange {
    #[serde(rename = "@odata.type")]
    pub odata_type: &'static str,

    #[serde(rename = "cidrAddress")]
    pub cidr_address: String,
}

impl From<&CidrEntry> for IpRange {
    fn from(entry: &CidrEntry) -> Self {
        Self {
            odata_type: if entry.is_ipv4() {
                IPV4_RANGE_TYPE
            } else {
                IPV6_RANGE_TYPE
            },
            cidr_address: entry.cidr.clone(),
        }
    }
}

/// Replacement body for an IP named location.
///
/// Every field is sent, so the PATCH overwrites the whole range list.
#[derive(Debug, Clone, Serialize)]
pub struct IpNamedLocation {
    #[serde(rename = "@odata.type")]
    pub odata_type: &'static str,

    #[serde(rename = "displayName")]
    pub display_name: String,

    /// Always false; the list is a blocklist.
    #[serde(rename = "isTrusted")]
    pub is_trusted: bool,

    #[serde(rename = "ipRanges")]
    pub ip_ranges: Vec<IpRange>,
}

impl IpNamedLocation {
    pub fn new(display_name: impl Into<String>, entries: &[CidrEntry]) -> Self {
        Self {
            odata_type: IP_NAMED_LOCATION_TYPE,
            display_name: display_name.into(),
            is_trusted: false,
            ip_ranges: entries.iter().map(IpRange::from).collect(),
        }
    }
}

/// Result of the update call.
#[derive(Debug)]
pub enum UpdateOutcome {
    /// 2xx. `body` is the returned resource, absent on 204.
    Updated {
        status: StatusCode,
        body: Option<serde_json::Value>,
    },
    /// Any other status, with the raw response text.
    Rejected { status: StatusCode, body: String },
}

impl UpdateOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UpdateOutcome::Updated { .. })
    }
}

/// Client for the named location endpoint.
pub struct NamedLocationClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl NamedLocationClient {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            base_url: format!(
                "{}/{}/identity/conditionalAccess/namedLocations",
                config.graph.graph_endpoint(),
                config.graph.api_version
            ),
            retry: config.http.retry.clone(),
        }
    }

    /// Resource URL of one named location.
    pub fn location_url(&self, id: &str) -> String {
        format!("{}/{}", self.base_url, id)
    }

    /// Overwrite the named location with `location`.
    ///
    /// Non-success statuses are reported through [`UpdateOutcome::Rejected`]
    /// rather than as errors. Transport failures still return `Err`.
    pub async fn replace_ranges(
        &self,
        token: &AccessToken,
        id: &str,
        location: &IpNamedLocation,
    ) -> Result<UpdateOutcome, SyncError> {
        let url = self.location_url(id);
        debug!(url = %url, ranges = location.ip_ranges.len(), "Updating named location");

        let result = retry_with_backoff(&self.retry, "named location update", || {
            self.patch(token, &url, location)
        })
        .await;

        let outcome = match result {
            Ok(outcome) => outcome,
            // Retries ran out on a transient status.
            Err(SyncError::Status { status, body }) => UpdateOutcome::Rejected { status, body },
            Err(e) => return Err(e),
        };

        match &outcome {
            UpdateOutcome::Updated { status, .. } => {
                info!(status = %status, ranges = location.ip_ranges.len(), "Named location updated")
            }
            UpdateOutcome::Rejected { status, .. } => {
                info!(status = %status, "Named location update rejected")
            }
        }

        Ok(outcome)
    }

    async fn patch(
        &self,
        token: &AccessToken,
        url: &str,
        location: &IpNamedLocation,
    ) -> Attempt<UpdateOutcome> {
        let response = match self
            .client
            .patch(url)
            .header(AUTHORIZATION, token.authorization())
            .json(location)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Attempt::from(Err(e.into())),
        };

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Attempt::from(Err(e.into())),
        };

        if status.is_success() {
            return Attempt::from(decode_body(&body).map(|body| UpdateOutcome::Updated { status, body }));
        }

        if is_transient_status(status) {
            return Attempt {
                result: Err(SyncError::Status { status, body }),
                retry_after,
            };
        }

        Attempt::from(Ok(UpdateOutcome::Rejected { status, body }))
    }
}

fn decode_body(body: &str) -> Result<Option<serde_json::Value>, SyncError> {
    if body.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(body)
        .map(Some)
        .map_err(|e| SyncError::InvalidResponse(format!("Failed to parse response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ip_list::normalize_line;
    use serde_json::json;

    fn entries(lines: &[&str]) -> Vec<CidrEntry> {
        lines.iter().map(|l| normalize_line(l).unwrap()).collect()
    }

    #[test]
    fn test_payload_shape() {
        let location = IpNamedLocation::new(
            "Github Blocklist (arc-known-threats.txt)",
            &entries(&["10.0.0.1", "192.168.1.0/24"]),
        );

        let value = serde_json::to_value(&location).unwrap();
        assert_eq!(
            value,
            json!({
                "@odata.type": "#microsoft.graph.ipNamedLocation",
                "displayName": "Github Blocklist (arc-known-threats.txt)",
                "isTrusted": false,
                "ipRanges": [
                    {"@odata.type": "#microsoft.graph.iPv4CidrRange", "cidrAddress": "10.0.0.1/32"},
                    {"@odata.type": "#microsoft.graph.iPv4CidrRange", "cidrAddress": "192.168.1.0/24"}
                ]
            })
        );
    }

    #[test]
    fn test_ipv6_range_type() {
        let location = IpNamedLocation::new("v6", &entries(&["2001:db8::/48", "::1"]));
        assert_eq!(location.ip_ranges[0].odata_type, IPV6_RANGE_TYPE);
        assert_eq!(location.ip_ranges[1].cidr_address, "::1/128");
    }

    #[test]
    fn test_empty_list_clears_ranges() {
        let location = IpNamedLocation::new("empty", &[]);
        let value = serde_json::to_value(&location).unwrap();
        assert_eq!(value["ipRanges"], json!([]));
        assert_eq!(value["isTrusted"], json!(false));
    }

    #[test]
    fn test_location_url() {
        let client = NamedLocationClient::new(Client::new(), &Config::default());
        assert_eq!(
            client.location_url("abc"),
            "https://graph.microsoft.com/v1.0/identity/conditionalAccess/namedLocations/abc"
        );
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body("").unwrap(), None);
        assert_eq!(decode_body("  ").unwrap(), None);
        assert_eq!(decode_body(r#"{"id":"x"}"#).unwrap(), Some(json!({"id": "x"})));
        assert!(matches!(
            decode_body("not json"),
            Err(SyncError::InvalidResponse(_))
        ));
    }
}
