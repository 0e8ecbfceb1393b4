pub mod admin;
pub mod error;
pub mod extractors;
pub mod tenant;
