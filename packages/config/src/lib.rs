// ABOUTME: Configuration constants shared across Estately packages
// ABOUTME: Keeps environment variable names in one place

pub mod constants;
