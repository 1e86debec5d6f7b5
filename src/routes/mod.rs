//! HTTP routes

pub mod upload;
