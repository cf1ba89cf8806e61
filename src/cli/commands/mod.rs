//! CLI command implementations.

mod chat;
mod config;
mod doctor;
mod process;
mod serve;
mod sessions;

pub use chat::run_chat;
pub use config::run_config;
pub use doctor::run_doctor;
pub use process::run_process;
pub use serve::{router, run_serve};
pub use sessions::run_sessions;
