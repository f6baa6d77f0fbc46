//! Integration test modules

mod config;
mod lifecycle;
mod sync;
