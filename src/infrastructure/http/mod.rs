//! Shared JSON-over-HTTP client used by every outbound adapter

mod client;

pub use client::{HttpClient, HttpClientTrait};

#[cfg(test)]
pub use client::mock::MockHttpClient;
