//! Core engine: price lookup, order execution and the scheduling loop.

pub mod controller;
pub mod executor;
pub mod price;
