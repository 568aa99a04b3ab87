pub mod health;
pub mod metrics;
pub mod webhook;

pub use health::health_check;
pub use metrics::get_prometheus_metrics;
pub use webhook::webhook_to_devops;
