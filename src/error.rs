use thiserror::Error;

/// Why a stock lookup for one sentence produced nothing usable.
///
/// Every variant is recovered by the assembler with a solid-color segment;
/// the kind only matters for the log line.
#[derive(Error, Debug)]
pub enum StockError {
    #[error("stock search is not configured (PIXABAY_API_KEY missing)")]
    Unconfigured,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("stock service returned HTTP {0}")]
    Status(u16),

    #[error("stock service quota exhausted (HTTP 429)")]
    Quota,

    #[error("could not decode stock search response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("stock download stalled: no data for {0:?}")]
    Stalled(std::time::Duration),

    #[error("stock cache IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StockError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::Network(_) => "network",
            Self::Status(_) => "status",
            Self::Quota => "quota",
            Self::Decode(_) => "decode",
            Self::Stalled(_) => "stalled",
            Self::Io(_) => "io",
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScriptError {
    #[error("language model returned an empty response")]
    EmptyResponse,

    #[error("script contains no sentences")]
    NoSentences,
}
