use chrono::NaiveDate;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DashboardError>;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("invalid range: {from} is after {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },

    #[error("no renderable surface supplied")]
    MissingSurface,

    #[error("invalid page geometry: {0}")]
    InvalidGeometry(String),

    /// Record source could not be reached. Callers normally recover this
    /// into an empty batch via `source::fetch_ingested`.
    #[error("record source unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("rasterization failed: {0}")]
    Rasterize(String),

    #[error("workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
