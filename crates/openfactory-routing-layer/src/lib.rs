pub mod config;
pub mod error;
pub mod sse_proxy;
pub mod web;
