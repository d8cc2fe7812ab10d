//! Harvest CLI library — command implementations shared by the `harvest`
//! binary and its integration tests.

pub mod commands;
