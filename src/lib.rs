pub mod api;
pub mod breaker;
pub mod cache;
pub mod config;
pub mod domain;
pub mod humanize;
pub mod observability;
pub mod queue;
pub mod ratelimiter;
pub mod store;
pub mod sweeper;
pub mod vendor;
pub mod worker;

pub type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;
