//! HTTP client module
//!
//! Provides the HTTP client used by every workload.

mod client;

pub use client::{lookup_path, Headers, HttpClient, HttpError, HttpResponse};
