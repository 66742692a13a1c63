//! Deduplication and idle suppression for sampled joystick events

use crate::controller::event_sampler::InputEvent;
use tracing::debug;

/// Decides whether `current` is a meaningful transition from `previous`
///
/// Repeats of the previous sample and idle samples are dropped.
pub fn should_forward(current: &InputEvent, previous: &InputEvent) -> bool {
    current != previous && !current.is_idle()
}

/// Holds the last seen sample for [`should_forward`]
///
/// The baseline is replaced by every sample, forwarded or not.
#[derive(Debug, Default)]
pub struct EventFilter {
    previous: InputEvent,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&mut self, event: InputEvent) -> Option<InputEvent> {
        if should_forward(&event, &self.previous) {
            self.previous = event.clone();
            Some(event)
        } else {
            debug!("Event filtered: {:?}", event);
            self.previous = event;
            None
        }
    }

    #[cfg(test)]
    fn previous(&self) -> &InputEvent {
        &self.previous
    }
}
