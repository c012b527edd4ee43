//! Hiring-funnel simulation: derive candidate counts stage by stage, forward
//! from a candidate pool or backward from a hiring target, with per-stage
//! overrides and sum adjustments.

pub mod cli;
pub mod config;
pub mod data;
pub mod funnel;
pub mod logging;
pub mod report;
pub mod server;
pub mod session;
