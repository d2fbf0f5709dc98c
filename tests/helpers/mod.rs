pub mod app;
pub mod payloads;
