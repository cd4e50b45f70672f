pub mod cli;
pub mod commands;
pub mod config;
pub mod crew;
pub mod doctor;
pub mod error;
pub mod provider;
pub mod report;
pub mod session;
pub mod streaming;
pub mod telemetry;
pub mod tools;

#[cfg(test)]
mod tests;
