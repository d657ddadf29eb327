mod audit;
mod events;
mod ids;
mod list_plan;
mod repository;

pub use audit::AuditRepository;
pub use events::{EventConsumer, EventPublisher};
pub use ids::IdGenerator;
pub use list_plan::{KeysetBoundary, ListCondition, ListFilter, ListPlan};
pub use repository::ResourceRepository;
