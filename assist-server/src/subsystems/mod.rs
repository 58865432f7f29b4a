pub mod booking;
pub mod sweeper;
