//! Controller Handle - runs the sampling stage of the input pipeline
//!
//! Drives an [`EventSampler`] through an [`EventFilter`] on a blocking thread and hands
//! every forwarded event to the dispatcher through a single-slot channel.
//!

use chrono::Local;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub use super::device::{DeviceError, GilrsDevice, InputDevice, RawState};
pub use super::event_filter::{should_forward, EventFilter};
pub use super::event_sampler::{EventSampler, InputEvent};

use crate::config::JoystickConfig;

/// Errors that end the sampling stage
#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    /// The joystick could not be read; there is no recovering from this
    #[error("Device error: {0}")]
    DeviceError(#[from] DeviceError),

    /// The dispatcher side of the handoff channel went away
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// The blocking sampler task panicked or was aborted
    #[error("Sampler task failed: {0}")]
    TaskError(String),
}

/// Counters for one run of the sampling loop
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SamplerStats {
    pub sampled: u64,
    pub forwarded: u64,
}

/// Reads the sampler to exhaustion, forwarding filtered events to `sender`
///
/// `blocking_send` on the single-slot channel stalls the sampler while the dispatcher
/// is busy, so no backlog of stale input can build up. Returns when the sampler is
/// cancelled, or with an error on a device failure.
pub fn run_input_loop<D: InputDevice>(
    sampler: EventSampler<D>,
    sender: mpsc::Sender<InputEvent>,
) -> Result<SamplerStats, SamplerError> {
    info!("Starting input loop");

    let mut filter = EventFilter::new();
    let mut stats = SamplerStats::default();

    // For performance monitoring
    let mut window = SamplerStats::default();
    let mut last_log_time = Local::now();
    let log_interval = chrono::Duration::seconds(10);

    for sample in sampler {
        let event = sample?;
        stats.sampled += 1;
        window.sampled += 1;

        if let Some(event) = filter.accept(event) {
            debug!("Forwarding event: {:?}", event);
            sender.blocking_send(event).map_err(|e| {
                error!("Failed to hand event to dispatcher: {}", e);
                SamplerError::ChannelError(e.to_string())
            })?;
            stats.forwarded += 1;
            window.forwarded += 1;
        }

        let now = Local::now();
        if now - last_log_time > log_interval {
            info!(
                "Sampler stats: {} samples, {} forwarded in last {} seconds",
                window.sampled,
                window.forwarded,
                log_interval.num_seconds()
            );
            window = SamplerStats::default();
            last_log_time = now;
        }
    }

    info!(
        "Input loop stopped after {} samples ({} forwarded)",
        stats.sampled, stats.forwarded
    );
    Ok(stats)
}

/// Handle for the sampling stage running on tokio's blocking pool
pub struct ControllerHandle {
    task_handle: JoinHandle<Result<SamplerStats, SamplerError>>,
}

impl ControllerHandle {
    /// Spawns the sampler and filter for `device`
    ///
    /// The stage stops once `token` is cancelled; the poll interval in `settings` bounds
    /// how long that takes to be noticed.
    pub fn spawn<D>(
        device: D,
        settings: &JoystickConfig,
        sender: mpsc::Sender<InputEvent>,
        token: CancellationToken,
    ) -> Self
    where
        D: InputDevice + 'static,
    {
        info!("Spawning input stage with settings: {:?}", settings);
        let sampler = EventSampler::new(device, token, settings.poll_interval());

        let task_handle = tokio::task::spawn_blocking(move || run_input_loop(sampler, sender));
        debug!("Blocking task spawned with handle: {:?}", task_handle);

        Self { task_handle }
    }

    /// Waits for the sampling stage to end
    pub async fn finished(self) -> Result<SamplerStats, SamplerError> {
        match self.task_handle.await {
            Ok(result) => result,
            Err(e) => {
                error!("Sampler task panicked: {}", e);
                Err(SamplerError::TaskError(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::event_sampler::tests::{raw, ScriptedDevice};
    use std::time::Duration;

    fn sampler(script: Vec<Result<Option<RawState>, DeviceError>>) -> EventSampler<ScriptedDevice> {
        let token = CancellationToken::new();
        let device = ScriptedDevice::new(script).cancel_when_done(token.clone());
        EventSampler::new(device, token, Duration::from_millis(1))
    }

    #[test]
    fn only_transitions_reach_the_dispatcher() {
        let (tx, mut rx) = mpsc::channel(1);
        let sampler = sampler(vec![
            Ok(Some(raw(0, &[0, 0]))),
            Ok(Some(raw(0b100, &[0, 0]))),
            Ok(Some(raw(0b100, &[0, 0]))),
            Ok(Some(raw(0, &[0, 0]))),
            Ok(Some(raw(0, &[-40, 0]))),
        ]);

        let worker = std::thread::spawn(move || run_input_loop(sampler, tx));

        let mut received = Vec::new();
        while let Some(event) = rx.blocking_recv() {
            received.push(event);
        }

        let stats = worker.join().unwrap().unwrap();
        assert_eq!(stats, SamplerStats { sampled: 5, forwarded: 2 });
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].single_button(), Some(2));
        assert_eq!(received[1].first_axis(), -40);
    }

    #[test]
    fn device_failure_ends_the_loop_with_an_error() {
        let (tx, _rx) = mpsc::channel(1);
        let sampler = sampler(vec![Err(DeviceError::Disconnected("pad".to_string()))]);

        let result = run_input_loop(sampler, tx);
        assert!(matches!(
            result,
            Err(SamplerError::DeviceError(DeviceError::Disconnected(_)))
        ));
    }

    #[test]
    fn closed_dispatcher_channel_is_reported() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sampler = sampler(vec![Ok(Some(raw(1, &[0, 0])))]);

        let result = run_input_loop(sampler, tx);
        assert!(matches!(result, Err(SamplerError::ChannelError(_))));
    }

    #[tokio::test]
    async fn spawned_stage_stops_on_cancel() {
        let (tx, _rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        let device = ScriptedDevice::new(Vec::new());
        let settings = JoystickConfig {
            poll_interval_ms: 1,
            ..JoystickConfig::default()
        };

        let handle = ControllerHandle::spawn(device, &settings, tx, token.clone());
        token.cancel();

        let stats = handle.finished().await.unwrap();
        assert_eq!(stats.forwarded, 0);
    }
}
