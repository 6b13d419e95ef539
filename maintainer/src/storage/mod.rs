//! Local storage

pub mod json_file;
pub mod settings;
