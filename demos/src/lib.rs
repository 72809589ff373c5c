pub mod parsers;
pub mod runs;
