//! ADPOD: real-time ad-pod auction and sequencing engine
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod error;
pub mod types;
pub mod registry;
pub mod predictor;
pub mod advisor;
pub mod planner;
pub mod dispatch;
pub mod auction;
pub mod learning;
pub mod engine;
pub mod server;
