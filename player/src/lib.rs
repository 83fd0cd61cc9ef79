pub mod abr;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod player;
pub mod throughput;
pub mod view;

#[cfg(test)]
mod testing;
