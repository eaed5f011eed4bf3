mod api;

pub use api::{HealthResponse, SuccessResponse};
