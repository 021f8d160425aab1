#![warn(missing_docs)]

//! STEP file import for the stepmesh kernel.
//!
//! Reads STEP files (ISO 10303-21) containing B-rep solids into the
//! lightweight face/loop model of `stepmesh-kernel-geom`. Targets the
//! AP203/AP214/AP242 subset that mechanical CAD exports for analytic
//! geometry.
//!
//! # Example
//!
//! ```no_run
//! use stepmesh_kernel_step::read_step;
//!
//! let solids = read_step("model.step").unwrap();
//! println!("{} solid(s)", solids.len());
//! ```

mod entities;
mod error;
mod lexer;
mod parser;
mod reader;

pub use error::StepError;
pub use reader::{read_step, read_step_from_buffer};
