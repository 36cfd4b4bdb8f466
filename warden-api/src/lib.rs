pub mod app;
pub mod auth;
pub mod handlers;
pub mod settings;
