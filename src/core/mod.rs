//! Core infrastructure shared by the executor and the CLI.

pub mod context;
pub mod hash;
pub mod lock;
pub mod output;
