//! Upscaler - image upload front-end for Real-ESRGAN style upscalers
//!
//! This library crate exposes the core functionality for integration testing.

pub mod backend;
pub mod config;
pub mod error;
pub mod images;
pub mod server;
