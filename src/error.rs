use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("HTTP {status} for {url}")]
    Http {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("resource gone: {url}")]
    Gone { url: String },

    #[error("rate limit not lifted after {attempts} attempts for {url}")]
    RateLimitExhausted { url: String, attempts: u32 },

    #[error("no usable image for product {title:?}")]
    MissingImage { title: String },

    #[error("product link missing or unusable")]
    MissingLink,

    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
