pub mod cli;
pub mod config;
pub mod logging;
pub mod remote;
pub mod resolver;
pub mod secrets;
pub mod store;
pub mod sync;
