pub mod alias;
pub mod identity;
pub mod policy;
