pub mod cli;
pub mod drive;
pub mod load_config;
pub mod transformer;

pub use cli::{run, Cli, Commands};
