pub mod catalog;
pub mod node;
pub mod resource;
