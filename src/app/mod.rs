mod builder;
mod controls;
mod lifecycle;
mod reader;
mod runtime;
mod types;

#[cfg(test)]
mod tests;

pub use builder::ReaderBuilder;
pub use reader::BarcodeReader;
pub use types::{ReaderCommand, ShutdownReason};
