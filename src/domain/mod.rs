pub mod arguments;
pub mod options;
pub mod share;
