mod cli;

pub use cli::Config;
