pub mod analyze;
pub mod scenarios;
