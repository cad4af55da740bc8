//! Panorama overlay: locate the video and chat regions of a host document,
//! force a full-width chat layout onto their common ancestor, and keep it
//! asserted while the host re-renders.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
