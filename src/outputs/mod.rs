//! Output generation.
//!
//! - [`csv`]: writes the capture store to `<output_dir>/<handle>.csv`

pub mod csv;
