pub mod app_listener;
pub mod state;
