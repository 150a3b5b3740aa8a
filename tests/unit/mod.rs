pub mod common;
// Serializer cache tests - single-flight, statistics, upgrades
pub mod cache;
// Configuration loading and startup checks
pub mod config;
