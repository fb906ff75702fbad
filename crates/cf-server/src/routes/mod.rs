//! Route handlers for the HTTP API.

pub mod download;
pub mod health;
pub mod info;
pub mod tools;
