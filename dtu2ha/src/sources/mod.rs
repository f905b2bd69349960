pub mod dtu;
pub mod fake;
