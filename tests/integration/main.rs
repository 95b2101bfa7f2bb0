//! End-to-end tests: planner → dispatcher → auction → learning, driven by
//! in-memory demand sources.

mod mock_source;
mod simulation;
