pub mod cli;
pub mod config;
pub mod geometry;
pub mod input;
pub mod logging;
pub mod model;
pub mod runtime;
pub mod search;
pub mod selection;
pub mod session;
pub mod store;
pub mod variants;
