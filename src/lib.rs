//! Library exports for the form builder service
//!
//! This module exposes internal components for testing and potential library usage.

pub mod adapter;
pub mod collector;
pub mod config;
pub mod database;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod route;
pub mod state;
pub mod stats;
pub mod store;
pub mod upstream;
