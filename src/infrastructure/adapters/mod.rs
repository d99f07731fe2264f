//! Chat platform adapters

pub mod console;
pub mod matrix;

pub use console::ConsoleAdapter;
pub use matrix::MatrixAdapter;
