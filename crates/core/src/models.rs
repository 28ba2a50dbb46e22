pub mod appointment;
pub mod filter;
