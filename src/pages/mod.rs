pub mod board;
pub mod login;
pub mod settings;
