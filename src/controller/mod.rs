//! Joystick input subsystem
//!
//! Implements the producing half of the pipeline:
//!
//! 1. [`device`] - Gamepad access through gilrs
//! 2. [`event_sampler`] - Raw state to [`InputEvent`](event_sampler::InputEvent) conversion
//! 3. [`event_filter`] - Deduplication and idle suppression
//! 4. [`controller_handle`] - Blocking task that ties the stages together
//!
//! # Architecture
//!
//! ```text
//! Gamepad ──► Sampler ──► Filter ──► mpsc(1) ──► Dispatcher
//!            (InputEvent)  (Transitions)
//! ```

pub mod controller_handle;
pub mod device;
pub mod event_filter;
pub mod event_sampler;
