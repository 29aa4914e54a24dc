//! A3S Image CLI - inspect and convert container image directories.

pub mod commands;
pub mod layout;
pub mod output;
