//! Node Maintainer Library
//!
//! Maintenance jobs that detect divergence between node allocation and
//! deployed applications, and redeploy the affected applications.

pub mod app;
pub mod clock;
pub mod deploy;
pub mod errors;
pub mod logs;
pub mod maintenance;
pub mod nodes;
pub mod server;
pub mod storage;
pub mod utils;
