pub mod appointment_row;
