pub mod app;
pub mod canvas;
pub mod capture;
pub mod config;
pub mod countdown;
pub mod endpoints;
pub mod events;
pub mod inferer;
pub mod loader;
pub mod nn;
pub mod render;
pub mod server;
pub mod source;
pub mod status;
pub mod surface;
