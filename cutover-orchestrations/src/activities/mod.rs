//! Atomic deployment steps shared by the orchestrations
//!
//! Each activity issues a small number of platform calls and reports into
//! the command unit it is given.

pub mod autoscaler;
pub mod create;
pub mod delete;
pub mod releases;
pub mod rename;
pub mod resize;
pub mod routes;
