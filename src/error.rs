//! Error type shared by every sync stage.

use reqwest::StatusCode;
use std::path::PathBuf;

/// Error from any stage of a sync run.
#[derive(Debug)]
pub enum SyncError {
    /// Missing or invalid configuration value.
    Config(String),
    /// Token endpoint did not hand out an access token.
    Authentication(String),
    /// Input file does not exist.
    FileNotFound(PathBuf),
    /// IO error.
    Io(std::io::Error),
    /// Input line is neither an IP address nor a CIDR block.
    Validation {
        line: usize,
        content: String,
        reason: String,
    },
    /// HTTP request failed.
    Http(reqwest::Error),
    /// Timeout.
    Timeout,
    /// Non-success HTTP status.
    Status { status: StatusCode, body: String },
    /// Invalid response.
    InvalidResponse(String),
}

impl SyncError {
    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Timeout => true,
            SyncError::Http(e) => e.is_connect(),
            SyncError::Status { status, .. } => is_transient_status(*status),
            _ => false,
        }
    }
}

/// Rate limiting and server-side failures are worth another attempt.
pub fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Config(msg) => write!(f, "Configuration error: {}", msg),
            SyncError::Authentication(msg) => write!(f, "Authentication failed: {}", msg),
            SyncError::FileNotFound(path) => {
                write!(f, "Input file not found: {}", path.display())
            }
            SyncError::Io(e) => write!(f, "IO error: {}", e),
            SyncError::Validation {
                line,
                content,
                reason,
            } => write!(f, "Invalid entry on line {} ({:?}): {}", line, content, reason),
            SyncError::Http(e) => write!(f, "HTTP error: {}", e),
            SyncError::Timeout => write!(f, "Request timed out"),
            SyncError::Status { status, body } => write!(f, "HTTP {}: {}", status, body),
            SyncError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Io(e) => Some(e),
            SyncError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SyncError::Timeout
        } else {
            SyncError::Http(e)
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self {
        SyncError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_transient_status(StatusCode::FORBIDDEN));
        assert!(!is_transient_status(StatusCode::BAD_REQUEST));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_is_transient() {
        assert!(SyncError::Timeout.is_transient());
        assert!(SyncError::Status {
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
        }
        .is_transient());
        assert!(!SyncError::Status {
            status: StatusCode::UNAUTHORIZED,
            body: String::new(),
        }
        .is_transient());
        assert!(!SyncError::Authentication("nope".to_string()).is_transient());
        assert!(!SyncError::Config("missing".to_string()).is_transient());
    }

    #[tokio::test]
    async fn test_connect_failure_is_transient() {
        // Bind then drop to get a local port with nothing listening.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let err = reqwest::Client::new()
            .get(format!("http://127.0.0.1:{}/", port))
            .send()
            .await
            .unwrap_err();
        let err = SyncError::from(err);

        assert!(matches!(err, SyncError::Http(ref e) if e.is_connect()));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_variant() {
        // Accepts but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let err = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(50))
            .build()
            .unwrap()
            .get(format!("http://{}/", addr))
            .send()
            .await
            .unwrap_err();

        let err = SyncError::from(err);
        assert!(matches!(err, SyncError::Timeout));
        assert!(err.is_transient());
    }

    #[test]
    fn test_validation_display() {
        let err = SyncError::Validation {
            line: 5,
            content: "not-an-ip".to_string(),
            reason: "invalid IP address syntax".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid entry on line 5 (\"not-an-ip\"): invalid IP address syntax"
        );
    }
}
