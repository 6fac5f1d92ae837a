pub mod config;
pub mod connector;
pub mod errors;
pub mod models;
pub mod plugins;
pub mod request;
pub mod response;
pub mod settings;
pub mod streaming;
pub mod transport;
