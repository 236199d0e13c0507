pub mod admin;
pub mod health;
pub mod status;
pub mod targets;
