pub mod annotations;
pub mod builder;
pub mod cache;
pub mod executor;
pub mod identity;
pub mod manifest;
pub mod orchestrator;
pub mod resolver;
pub mod session;

pub use builder::{BuildMode, Builder, SwiftBuilder};
pub use cache::Maintenance;
pub use session::{MaintenanceReport, Outcome, Session};
