//! HTTP surface for the cleaning service.
//!
//! | Method | Path | Purpose |
//! |---|---|---|
//! | `GET` | `/health` | liveness |
//! | `POST` | `/clean` | run a batch and wait for the report |
//! | `POST` | `/clean/start` | start a background job |
//! | `GET` | `/clean/status?job_id=` | poll a background job |
//! | `POST` | `/upload-test` | push the bundled test image to an upload endpoint |

mod error;
pub mod handlers;
mod routes;
pub mod sandbox;
mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
