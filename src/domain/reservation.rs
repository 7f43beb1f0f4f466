pub mod engine;
pub mod request;
pub mod reservation;
pub mod summary;
