pub mod classifier;
pub mod identity;
pub mod persist;
pub mod presence;
pub mod service;
