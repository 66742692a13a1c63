//! Translation of joystick transitions into controller commands.
//!
//! The consuming half of the pipeline: [`Dispatcher`] takes one [`InputEvent`] at a
//! time from the sampling stage, picks a [`Command`](crate::grbl::Command) with the
//! fixed rules in [`dispatcher`] and performs the exchange synchronously.
//!
//! [`InputEvent`]: crate::controller::controller_handle::InputEvent

pub mod dispatcher;

pub use dispatcher::{route, DispatchStats, Dispatcher, Route};
