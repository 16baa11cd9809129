pub mod config;
pub mod logbook;
pub mod runtime;
pub mod sync;
pub mod token;
