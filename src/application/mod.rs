// Application layer - Polling and setup use cases
pub mod device_source;
pub mod poller;
pub mod setup;
