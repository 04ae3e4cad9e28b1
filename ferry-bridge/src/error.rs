use thiserror::Error;

/// Error surface for the compilation service client.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The service rejected a request, or sent something that does not decode.
    /// Carries the offending payload for diagnostics.
    #[error("compilation service decode error: {payload}")]
    Decode { payload: serde_json::Value },

    #[error("I/O error on {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("service protocol error: {0}")]
    Protocol(String),

    #[error("compilation service is not reachable at {endpoint}")]
    ServiceUnavailable { endpoint: String },
}

pub(crate) fn io_err(context: impl Into<String>, source: std::io::Error) -> BridgeError {
    BridgeError::Io {
        context: context.into(),
        source,
    }
}
