// Test Module Organization

// Unit tests - Fast tests against the in-memory registry, no external services
pub mod unit;
