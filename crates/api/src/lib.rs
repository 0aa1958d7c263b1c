pub mod config;
pub mod routes;
pub mod runs;
pub mod sinks;
pub mod state;
pub mod worker;

#[cfg(test)]
mod testing;

pub use config::{AppConfig, ConfigProblems};
pub use routes::router;
pub use state::AppState;
pub use worker::PaperWorker;
