pub mod logging;
pub mod parser;

pub use parser::parse_strict;
