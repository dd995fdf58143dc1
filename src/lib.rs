//! Time-bucketed sky-cover aggregation and report export.
//!
//! A query is resolved into a calendar interval, raw records are filtered
//! against it, grouped into buckets and summarized, and the result can be
//! exported as CSV, a workbook, Markdown, or a paginated document rendered
//! from any [`surface::Surface`].

pub mod aggregate;
pub mod categories;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod export;
pub mod ingest;
pub mod models;
pub mod paginate;
pub mod pdf;
pub mod range;
pub mod report;
pub mod slot;
pub mod source;
pub mod surface;
pub mod trend;

pub use error::{DashboardError, Result};
