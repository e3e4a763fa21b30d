pub mod booking;
pub mod calendar;
pub mod clock;
pub mod database;
pub mod projection;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod validator;
