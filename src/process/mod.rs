pub mod models;
pub mod runner;

pub use models::ToolConfig;
pub use runner::{SystemLauncher, ToolLauncher, ToolProcess};
