//! # Traffic Lights
//!
//! A light is a [`PhaseCycler`]: a background thread that alternates
//! between [`Phase::Red`] and [`Phase::Green`] and publishes every change
//! on a [`PhaseChannel`](crate::PhaseChannel).

mod cycler;
mod phase;

pub use cycler::PhaseCycler;
pub use phase::{is_green, Phase};
