use thiserror::Error;

use crate::orchestrator::JobId;

/// Failure reported by a [`crate::gateway::Gateway`] call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("authentication failure: {0}")]
    Authentication(String),
    #[error("rate limited by the wiki")]
    RateLimited,
    #[error("malformed API response: {0}")]
    MalformedResponse(String),
    #[error("MediaWiki API request failed with HTTP {0}")]
    Http(u16),
    #[error("MediaWiki API error [{code}]: {info}")]
    Api { code: String, info: String },
    #[error("gateway call panicked: {0}")]
    Panicked(String),
}

impl GatewayError {
    /// Classify a MediaWiki `error.code` into the matching category.
    pub fn from_api_code(code: &str, info: &str) -> Self {
        match code {
            "badtoken" | "notloggedin" | "assertuserfailed" | "assertbotfailed"
            | "permissiondenied" | "readapidenied" | "writeapidenied" | "protectedpage" => {
                Self::Authentication(format!("[{code}] {info}"))
            }
            "ratelimited" | "maxlag" => Self::RateLimited,
            _ => Self::Api {
                code: code.to_string(),
                info: info.to_string(),
            },
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimited)
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("job {job} ({kind}) failed: {source}")]
    Gateway {
        job: JobId,
        kind: &'static str,
        #[source]
        source: GatewayError,
    },
    #[error("worker pool is shut down")]
    PoolClosed,
}

impl OrchestratorError {
    pub fn gateway_error(&self) -> Option<&GatewayError> {
        match self {
            Self::Gateway { source, .. } => Some(source),
            Self::PoolClosed => None,
        }
    }
}
