pub mod models;
pub mod sampling;
