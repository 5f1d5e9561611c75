//! HTTP surface: the public webhook endpoints and the JWT-protected management API.

mod channels;
mod health;
mod messages;
mod metrics;
mod routes;
mod routings;
mod topics;
mod webhook;

pub use health::{health, HealthResponse};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
pub use webhook::{receive_webhook, webhook_info, WebhookAck};
