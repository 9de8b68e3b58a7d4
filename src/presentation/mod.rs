// Presentation layer - Read-only HTTP API for entity states
pub mod app_state;
pub mod handlers;
