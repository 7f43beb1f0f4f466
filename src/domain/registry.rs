pub mod probe;
pub mod registration;
pub mod registry;
