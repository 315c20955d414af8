pub mod document;
pub mod line;
pub mod step;
