#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The status check failed, so no generation was attempted.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    /// Model pull or warm-up failed. Carries the backend's own message.
    #[error("Error initializing model: {0}")]
    Init(String),
    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Invalid backend response: {0}")]
    Decode(#[from] serde_json::Error),
}
