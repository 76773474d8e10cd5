pub mod io;
pub mod sampling;
