//! Node inventory

pub mod model;
pub mod repository;
