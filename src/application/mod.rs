//! The application layer: market-data collaborator interfaces, the
//! filesystem cache, the bounded-concurrency universe loader and the
//! simulation driver built on top of the domain layer.

pub mod cache;
pub mod loader;
pub mod market_data;
pub mod simulation;
