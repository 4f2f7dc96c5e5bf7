pub mod adapter;
pub mod cache;
pub mod cli;
pub mod display;
pub mod input;
pub mod input_bridge;
pub mod model;
pub mod projection;
pub mod queue;
pub mod runtime;
pub mod scheduler;
pub mod script_host;
pub mod scripts;
pub mod settings;
pub mod snapshot;
pub mod stream;
pub mod targeting;
