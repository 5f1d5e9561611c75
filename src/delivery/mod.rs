//! Message delivery engine.
//!
//! - `strategy`: attempt ordering and terminal status rules
//! - `orchestrator`: the per-message state machine
//! - `log_writer`: one delivery log row per attempt
//! - `worker_pool`: bounded background processing for async topics

pub mod log_writer;
pub mod orchestrator;
pub mod strategy;
pub mod worker_pool;

pub use log_writer::{DeliveryLogWriter, SUCCESS_RESPONSE};
pub use orchestrator::{AttemptError, MessageProcessor, ProcessError, ProcessOutcome};
pub use strategy::{final_status, plan_attempts, should_continue};
pub use worker_pool::{DeliveryWorkerPool, SubmitError};
