pub mod activities;
pub mod devices;
pub mod tasks;
pub mod users;
