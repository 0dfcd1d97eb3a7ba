//! Intersection Traffic Simulation Library
//!
//! A local vehicle simulation for one signalized intersection whose signal
//! phase is owned by a remote controller. The simulation can run headless or
//! synchronized with the controller.

pub mod app;
pub mod config;
pub mod console;
pub mod simulation;
pub mod sync;
