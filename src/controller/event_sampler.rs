use crate::controller::device::{DeviceError, InputDevice, RawState};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Normalized joystick snapshot
///
/// Equality is component-wise: axes compare as an ordered sequence, buttons as a set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputEvent {
    axes: Vec<i32>,
    buttons: BTreeSet<u8>,
}

impl InputEvent {
    pub fn new(axes: Vec<i32>, buttons: impl IntoIterator<Item = u8>) -> Self {
        Self {
            axes,
            buttons: buttons.into_iter().collect(),
        }
    }

    /// Decodes a raw device state using the device's reported button and axis counts
    pub fn from_raw(raw: &RawState, button_count: usize, axis_count: usize) -> Self {
        let buttons = (0..button_count.min(u32::BITS as usize))
            .filter(|&idx| raw.buttons & (1u32 << idx) != 0)
            .map(|idx| idx as u8);

        // Missing axis readings count as centered
        let axes = (0..axis_count)
            .map(|idx| raw.axes.get(idx).copied().unwrap_or(0))
            .collect();

        Self::new(axes, buttons)
    }

    pub fn axes(&self) -> &[i32] {
        &self.axes
    }

    pub fn buttons(&self) -> &BTreeSet<u8> {
        &self.buttons
    }

    pub fn first_axis(&self) -> i32 {
        self.axes.first().copied().unwrap_or(0)
    }

    /// The pressed button if exactly one is held
    pub fn single_button(&self) -> Option<u8> {
        match self.buttons.len() {
            1 => self.buttons.first().copied(),
            _ => None,
        }
    }

    /// No buttons held and the axis values cancel out
    pub fn is_idle(&self) -> bool {
        let axis_sum: i64 = self.axes.iter().map(|&v| i64::from(v)).sum();
        axis_sum == 0 && self.buttons.is_empty()
    }
}

/// Lazy, non-restartable stream of [`InputEvent`]s read from an [`InputDevice`]
///
/// Each call to `next` blocks until the device reports a new state. The stream ends when
/// the cancellation token fires, and after yielding a device error it yields nothing more.
pub struct EventSampler<D: InputDevice> {
    device: D,
    token: CancellationToken,
    poll_interval: Duration,
    button_count: usize,
    axis_count: usize,
    failed: bool,
}

impl<D: InputDevice> EventSampler<D> {
    pub fn new(device: D, token: CancellationToken, poll_interval: Duration) -> Self {
        let button_count = device.button_count();
        let axis_count = device.axis_count();
        info!(
            "Creating Event Sampler: {} buttons, {} axes, poll interval {:?}",
            button_count, axis_count, poll_interval
        );

        Self {
            device,
            token,
            poll_interval,
            button_count,
            axis_count,
            failed: false,
        }
    }
}

impl<D: InputDevice> Iterator for EventSampler<D> {
    type Item = Result<InputEvent, DeviceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            if self.token.is_cancelled() {
                debug!("Sampler cancelled");
                return None;
            }

            match self.device.poll_state(self.poll_interval) {
                Ok(Some(raw)) => {
                    let event = InputEvent::from_raw(&raw, self.button_count, self.axis_count);
                    debug!("Sampled event: {:?}", event);
                    return Some(Ok(event));
                }
                Ok(None) => continue,
                Err(e) => {
                    error!("Failed to read input device: {}", e);
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
