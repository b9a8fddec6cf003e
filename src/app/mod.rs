// Application layer: user-facing commands built on the domain and the sync engine.

pub mod commands;

pub use commands::CommandOutput;
