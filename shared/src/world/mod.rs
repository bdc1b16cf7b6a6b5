pub mod avatar;
pub mod error;
pub mod swap;
pub mod world;
