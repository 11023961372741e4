//! Command line entry points.

mod show;

pub use show::{OutputFormat, ShowOptions, render_text, show};
