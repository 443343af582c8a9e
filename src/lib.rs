pub mod checks;
pub mod config;
pub mod errors;
pub mod package;
pub mod pipeline;
pub mod tools;
pub mod ui;
pub mod version;
