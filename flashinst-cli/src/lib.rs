//! Host tooling for flashinst flash images.
//!
//! The `flashinst` binary formats partition images, installs payloads the
//! way the firmware does at boot, and reads them back.

pub mod cli;
pub mod image;
pub mod path_parser;
