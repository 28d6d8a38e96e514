//! Flowpilot CLI library — command implementations shared by the
//! `flowpilot` binary and its integration tests.

pub mod commands;
