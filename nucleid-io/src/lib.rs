//! Output utilities shared by the nucleid crates
//!
//! # Unified opening of an output stream.
//!
//! [out_writer()] opens a file for writing. If the given file name is ``"stdout"`` or ``"stderr"``,
//! writes to the appropriate stream rather than to a file:
//!
//! ```
//! use std::fs;
//! use nucleid_io::out_writer;
//! // This will print on stdout
//! let mut to_stream = out_writer("", true).unwrap();
//! ```
//!
//! # Score formatting
//!
//! Identity records carry four significant digits ([format_sig4()]); cluster records carry
//! four fixed decimals ([format_fixed4()]).

mod utils;

pub use utils::*;
