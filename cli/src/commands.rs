mod config;
mod run;

pub use config::config;
pub use run::run;
