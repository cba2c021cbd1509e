use thiserror::Error;

/// Transport setup failures. Per-request failures never surface here; they
/// are recorded as network-failure measurements.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Failed to build HTTP client: {source}")]
    BuildClientFailed {
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to build client for virtual user {lane}: {source}")]
    LaneClientFailed {
        lane: usize,
        #[source]
        source: reqwest::Error,
    },
}

impl HttpError {
    /// Tags a client build failure with the virtual user it was meant for.
    #[must_use]
    pub fn for_lane(self, lane: usize) -> Self {
        match self {
            HttpError::BuildClientFailed { source } | HttpError::LaneClientFailed { source, .. } => {
                HttpError::LaneClientFailed { lane, source }
            }
        }
    }
}
