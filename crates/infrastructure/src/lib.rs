//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_audit_repository;
mod in_memory_resource_repository;
mod postgres_audit_repository;
mod postgres_resource_repository;
mod random_id_generator;
mod redis_event_publisher;
mod redis_event_subscriber;

pub use in_memory_audit_repository::InMemoryAuditRepository;
pub use in_memory_resource_repository::InMemoryResourceRepository;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_resource_repository::PostgresResourceRepository;
pub use random_id_generator::RandomIdGenerator;
pub use redis_event_publisher::RedisEventPublisher;
pub use redis_event_subscriber::RedisEventSubscriber;
