pub mod access;
pub mod registry;
pub mod reservation;
pub mod resource;
pub mod utils;
