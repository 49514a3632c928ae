//! Runtime adapters and the health-report surface.

pub mod api;
pub mod tokio_spawner;

pub use api::HealthReport;
pub use tokio_spawner::TokioSpawner;
