//! tablectl — multi-touch gesture engine for a shared interactive
//! surface. Tracks contacts, clusters co-located ones, classifies
//! tap/drag/pinch/rotate/throw gestures, and dispatches them onto
//! registered targets.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod detector;
pub mod evaluate;
pub mod geometry;
pub mod input;
pub mod logging;
pub mod pipeline;
pub mod point;
pub mod replay;
pub mod target;
