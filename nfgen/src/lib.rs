//! The nfgen synthetic `NetFlow` exporter.
//!
//! This library supports the nfgen binary found elsewhere in this project. It
//! wires the pure synthesis and encoding core from `nfgen_payload` to the
//! outside world: configuration files, host lists, the UDP socket and the
//! optional capture file.

#![deny(clippy::all)]
#![deny(clippy::cargo)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::module_name_repetitions)]

pub mod capture;
pub mod config;
pub mod emitter;
pub mod hosts;
pub mod transport;
