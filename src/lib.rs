pub mod aggregate;
pub mod analysis;
pub mod category;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod series;
pub mod value;
pub mod widget;

pub use dashboard::Dashboard;
pub use error::{Error, Result};
