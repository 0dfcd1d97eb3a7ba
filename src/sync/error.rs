/// Errors raised while talking to the signal controller.
///
/// None of these stop the simulation; callers log them and retry on the next
/// timer or reconnect.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The controller address could not be parsed or converted.
    #[error("invalid controller url '{url}': {detail}")]
    InvalidUrl { url: String, detail: String },

    /// The HTTP request failed before a response arrived.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The controller answered with a non-success status.
    #[error("{path} returned HTTP {status}")]
    Status { path: String, status: u16 },

    /// The response body was not a usable phase snapshot.
    #[error("malformed state from controller: {0}")]
    Malformed(#[from] serde_json::Error),
}
