pub mod health;
pub mod notification;

pub use health::{HealthResponse, LIVENESS_TEXT};
pub use notification::{Notification, StateSnapshot};
