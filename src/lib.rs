// Shared components
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod postgres;

// Domain and persistence
pub mod credentials;
pub mod domain;
pub mod repository;
pub mod template;

// Delivery
pub mod delivery;
pub mod transport;

// Application layer
pub mod api;
pub mod server;
pub mod service;

// Supporting modules
pub mod shutdown;
