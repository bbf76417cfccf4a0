//! HTTP surface of the personal-website chatbot.
//!
//! Kept as a library so the request handlers can be exercised directly in
//! integration tests; the binary entry point lives in `main.rs`.

pub mod service;
