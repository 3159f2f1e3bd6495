pub mod api;
pub mod client;
pub mod connection;
pub mod events;
pub mod parser;
pub mod poller;
pub mod service;
pub mod sse;

pub use api::ConcourseApi;
pub use client::HttpClient;
pub use connection::SseConnection;
