use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to serialize payload: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
    #[error("HTTP request failed: {source}")]
    Http {
        #[source]
        source: reqwest::Error,
    },
    #[error("Backend rejected payload: {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Failed to connect to proxy {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write to proxy {addr}: {source}")]
    Write {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Timed out delivering to proxy {addr}")]
    Timeout { addr: String },
}
