mod formsubmit;
mod health;

pub use formsubmit::form_submit;
pub use health::{health_check, readiness_check};
