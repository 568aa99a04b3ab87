// Middleware module - request logging and metrics.
// Inbound function-key checks live in `auth::middleware`.

pub mod metrics;
pub mod request_logger;

pub use metrics::metrics_middleware;
pub use request_logger::request_logger_middleware;
