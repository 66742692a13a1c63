use crate::config::JoystickConfig;
use gilrs::{Axis, Button, Event, EventType, GamepadId, Gilrs};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Full-scale magnitude of an axis reading, matching the Linux joystick API
pub const AXIS_MAX: i32 = 32_767;

// Button numbering follows the Linux xpad driver so index 4/5 are the bumpers
const BUTTON_MAP: [Button; 11] = [
    Button::South,
    Button::East,
    Button::West,
    Button::North,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::Select,
    Button::Start,
    Button::Mode,
    Button::LeftThumb,
    Button::RightThumb,
];

const AXIS_MAP: [Axis; 8] = [
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::LeftZ,
    Axis::RightStickX,
    Axis::RightStickY,
    Axis::RightZ,
    Axis::DPadX,
    Axis::DPadY,
];

// Raw device snapshot: bit i of `buttons` set means button i is held
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawState {
    pub buttons: u32,
    pub axes: Vec<i32>,
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Failed to initialize input backend: {0}")]
    InitializationError(String),

    #[error("No gamepad at index {index} ({available} connected)")]
    NotFound { index: usize, available: usize },

    #[error("Gamepad disconnected: {0}")]
    Disconnected(String),
}

/// A joystick that reports a fixed number of buttons and axes
///
/// `poll_state` blocks for at most `timeout` and returns `Ok(None)` when nothing new
/// arrived, so callers can interleave cancellation checks between polls.
pub trait InputDevice: Send {
    fn button_count(&self) -> usize;

    fn axis_count(&self) -> usize;

    fn poll_state(&mut self, timeout: Duration) -> Result<Option<RawState>, DeviceError>;
}

/// Gamepad backed by gilrs
pub struct GilrsDevice {
    gilrs: Gilrs,
    gamepad: GamepadId,
    deadzone: f32,
}

impl GilrsDevice {
    pub fn open(config: &JoystickConfig) -> Result<Self, DeviceError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(DeviceError::InitializationError(e.to_string()));
            }
        };

        let gamepads: Vec<GamepadId> = gilrs.gamepads().map(|(id, _)| id).collect();
        info!("Found {} gamepads", gamepads.len());
        for (idx, (id, gamepad)) in gilrs.gamepads().enumerate() {
            info!(
                "  [{}] ID: {}, Name: {}, UUID: {:?}",
                idx,
                id,
                gamepad.name(),
                gamepad.uuid()
            );
        }

        let gamepad = *gamepads
            .get(config.index)
            .ok_or(DeviceError::NotFound {
                index: config.index,
                available: gamepads.len(),
            })?;
        info!(
            "Selected gamepad {}: {} ({} buttons, {} axes)",
            config.index,
            gilrs.gamepad(gamepad).name(),
            BUTTON_MAP.len(),
            AXIS_MAP.len()
        );

        Ok(Self {
            gilrs,
            gamepad,
            deadzone: config.deadzone,
        })
    }

    fn snapshot(&self) -> RawState {
        let gamepad = self.gilrs.gamepad(self.gamepad);

        let buttons = BUTTON_MAP
            .iter()
            .enumerate()
            .filter(|(_, button)| gamepad.is_pressed(**button))
            .fold(0u32, |mask, (idx, _)| mask | (1u32 << idx));

        let axes = AXIS_MAP
            .iter()
            .map(|axis| scale_axis(apply_deadzone(gamepad.value(*axis), self.deadzone)))
            .collect();

        RawState { buttons, axes }
    }
}

impl InputDevice for GilrsDevice {
    fn button_count(&self) -> usize {
        BUTTON_MAP.len()
    }

    fn axis_count(&self) -> usize {
        AXIS_MAP.len()
    }

    fn poll_state(&mut self, timeout: Duration) -> Result<Option<RawState>, DeviceError> {
        let Some(Event { id, event, .. }) = self.gilrs.next_event_blocking(Some(timeout)) else {
            return Ok(None);
        };

        if id != self.gamepad {
            debug!("Skipping event from non-active gamepad: {:?}", id);
            return Ok(None);
        }

        match event {
            EventType::Disconnected => {
                warn!("Controller disconnected event detected");
                Err(DeviceError::Disconnected(
                    self.gilrs.gamepad(id).name().to_string(),
                ))
            }
            EventType::ButtonRepeated(button, _) => {
                debug!("Button repeat ignored: {:?}", button);
                Ok(None)
            }
            _ => {
                debug!("Processing gilrs event: {:?}", event);
                Ok(Some(self.snapshot()))
            }
        }
    }
}

// Rescales the value to the range outside the deadzone
fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone {
        0.0
    } else {
        let sign = if value < 0.0 { -1.0 } else { 1.0 };
        sign * (value.abs() - deadzone) / (1.0 - deadzone)
    }
}

fn scale_axis(value: f32) -> i32 {
    (value.clamp(-1.0, 1.0) * AXIS_MAX as f32).round() as i32
}
