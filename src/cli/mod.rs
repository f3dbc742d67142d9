//! Command-line front end for the pocketnotes library.

mod app;
mod args;

pub use app::*;
pub use args::*;
