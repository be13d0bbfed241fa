mod document;
mod model;

pub use document::{load, parse, render, write};
pub use model::{normalize_java_path, PackConfiguration};
