//! Plain-text IP list loading and CIDR normalization.

use crate::config::InvalidEntryPolicy;
use crate::error::SyncError;
use ipnet::IpNet;
use std::net::IpAddr;
use std::path::Path;
use tracing::{info, warn};

/// One normalized entry of the IP list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CidrEntry {
    /// CIDR text sent to Graph.
    pub cidr: String,
    /// Parsed network, used to pick the IPv4/IPv6 range type.
    pub net: IpNet,
}

impl CidrEntry {
    pub fn is_ipv4(&self) -> bool {
        matches!(self.net, IpNet::V4(_))
    }
}

/// A line that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidEntry {
    /// 1-based line number in the input.
    pub line: usize,
    /// Trimmed line content.
    pub content: String,
    pub reason: String,
}

/// Result of normalizing a whole list.
#[derive(Debug, Clone, Default)]
pub struct NormalizedList {
    /// Valid entries in input order.
    pub entries: Vec<CidrEntry>,
    /// Lines dropped under [`InvalidEntryPolicy::Skip`].
    pub skipped: Vec<InvalidEntry>,
}

impl NormalizedList {
    /// CIDR strings in input order.
    pub fn cidrs(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.cidr.as_str()).collect()
    }
}

/// Validate a single trimmed, non-empty line.
///
/// Lines with a `/` must parse as a network and are kept as written; host
/// bits are allowed. Bare addresses get a host prefix appended (`/32` for
/// IPv4, `/128` for IPv6).
pub fn normalize_line(line: &str) -> Result<CidrEntry, String> {
    if line.contains('/') {
        let net = line
            .parse::<IpNet>()
            .map_err(|e| format!("invalid CIDR notation: {}", e))?;
        return Ok(CidrEntry {
            cidr: line.to_string(),
            net,
        });
    }

    let addr = line
        .parse::<IpAddr>()
        .map_err(|e| format!("invalid IP address: {}", e))?;
    let host_prefix = match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    };
    let net = IpNet::new(addr, host_prefix).map_err(|e| e.to_string())?;
    Ok(CidrEntry {
        cidr: format!("{}/{}", line, net.prefix_len()),
        net,
    })
}

/// Line terminators: LF, CR, VT, FF, the FS/GS/RS separators, NEL, LS and PS.
fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Normalize the contents of an IP list.
pub fn normalize_entries(
    content: &str,
    policy: InvalidEntryPolicy,
) -> Result<NormalizedList, SyncError> {
    let mut list = NormalizedList::default();

    // `\r\n` is one break; collapse it first so line numbers stay right.
    let content = content.replace("\r\n", "\n");
    for (idx, raw) in content.split(is_line_break).enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        match normalize_line(line) {
            Ok(entry) => list.entries.push(entry),
            Err(reason) => match policy {
                InvalidEntryPolicy::Abort => {
                    return Err(SyncError::Validation {
                        line: idx + 1,
                        content: line.to_string(),
                        reason,
                    });
                }
                InvalidEntryPolicy::Skip => {
                    warn!(line = idx + 1, entry = %line, reason = %reason, "Skipping invalid entry");
                    list.skipped.push(InvalidEntry {
                        line: idx + 1,
                        content: line.to_string(),
                        reason,
                    });
                }
            },
        }
    }

    Ok(list)
}

/// Load and normalize an IP list from disk.
pub fn load_ip_list(path: &Path, policy: InvalidEntryPolicy) -> Result<NormalizedList, SyncError> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SyncError::FileNotFound(path.to_path_buf()),
        _ => SyncError::Io(e),
    })?;

    let list = normalize_entries(&content, policy)?;

    info!(
        path = %path.display(),
        entries = list.entries.len(),
        skipped = list.skipped.len(),
        "IP list loaded"
    );

    Ok(list)
}
