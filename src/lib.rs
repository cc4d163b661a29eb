//! Turns dictated clipboard text into editor actions

pub mod bridge;
pub mod config;
pub mod editor;
pub mod ports;
