pub mod config;
pub mod console;
pub mod question_loader;
