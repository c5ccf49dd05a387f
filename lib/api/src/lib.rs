//! # BloomDiet API
//!
//! actix-web REST surface over the prediction pipeline:
//!
//! | Method | Path | Body |
//! |--------|------|------|
//! | `GET`  | `/health` | - |
//! | `GET`  | `/schema` | - |
//! | `POST` | `/predict-one` | `{"data": {...}}` |
//! | `POST` | `/predict` | `{"records": [{...}, ...]}` |
//! | `POST` | `/predict-csv` | multipart, field `file` |
//!
//! Every route is also mounted under `/api`.

pub mod error;
pub mod rest;
pub mod state;
pub mod upload;

pub use error::ApiError;
pub use rest::{configure, cors, default_headers, RestApi, RestConfig, UploadLimits};
pub use state::ServingContext;
