pub mod appointment;
pub mod status;
