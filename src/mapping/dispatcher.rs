//! Command dispatcher: joystick transitions to GRBL commands
//!
//! Rules, first match wins:
//!
//! ```text
//! one button, index 0-3   ──► MoveToSegment(index)
//! one button, index >= 4  ──► nothing (the single-button rule still claims the event)
//! buttons exactly {4, 5}  ──► Home
//! axis 0 > 0              ──► JogNegative
//! axis 0 < 0              ──► JogPositive
//! anything else           ──► nothing
//! ```
//!
//! The stick's X axis runs opposite to the machine's Z axis, hence the crossed jogs.

use crate::controller::controller_handle::InputEvent;
use crate::grbl::{Command, ProtocolClient, ProtocolError, Response};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Number of buttons bound to preset positions
pub const SEGMENT_BUTTONS: u8 = 4;

/// Button chord that zeroes Z
pub const HOME_CHORD: [u8; 2] = [4, 5];

/// Outcome of matching an event against the dispatch rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Send(Command),
    /// Claimed by the single-button rule but bound to nothing
    Ignored,
    Unmapped,
}

pub fn route(event: &InputEvent) -> Route {
    if let Some(button) = event.single_button() {
        if button < SEGMENT_BUTTONS {
            return Route::Send(Command::MoveToSegment(button));
        }
        return Route::Ignored;
    }

    if event.buttons().iter().copied().eq(HOME_CHORD) {
        return Route::Send(Command::Home);
    }

    match event.first_axis() {
        0 => Route::Unmapped,
        x if x > 0 => Route::Send(Command::JogNegative),
        _ => Route::Send(Command::JogPositive),
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub sent: u64,
    pub failed: u64,
    pub skipped: u64,
}

pub struct Dispatcher {
    client: ProtocolClient,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(client: ProtocolClient) -> Self {
        Self {
            client,
            stats: DispatchStats::default(),
        }
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Routes one event and performs the resulting exchange, if any
    ///
    /// Returns `None` when the event maps to no command. Protocol errors are logged and
    /// handed back; they never stop the dispatcher.
    pub fn dispatch(&mut self, event: &InputEvent) -> Option<Result<Response, ProtocolError>> {
        let command = match route(event) {
            Route::Send(command) => command,
            Route::Ignored => {
                debug!(
                    "Single button {:?} has no binding, ignoring",
                    event.single_button()
                );
                self.stats.skipped += 1;
                return None;
            }
            Route::Unmapped => {
                debug!("No command for event: {:?}", event);
                self.stats.skipped += 1;
                return None;
            }
        };

        debug!("Dispatching {} for {:?}", command, event);
        let result = self.client.send(&command.line());
        match &result {
            Ok(response) if response.is_empty() => {
                debug!("{} got no reply", command);
                self.stats.sent += 1;
            }
            Ok(response) => {
                info!(">>> {}", response);
                self.stats.sent += 1;
            }
            Err(e) => {
                warn!("{} failed: {}", command, e);
                self.stats.failed += 1;
            }
        }
        Some(result)
    }

    /// Serves events until the sampling side hangs up
    pub fn run(mut self, mut receiver: mpsc::Receiver<InputEvent>) -> DispatchStats {
        info!("Starting dispatcher loop");
        while let Some(event) = receiver.blocking_recv() {
            let _ = self.dispatch(&event);
        }
        let stats = self.stats();
        info!(
            "Dispatcher stopped: {} sent, {} failed, {} skipped",
            stats.sent, stats.failed, stats.skipped
        );
        stats
    }

    /// Runs [`Dispatcher::run`] on tokio's blocking pool
    pub fn spawn(self, receiver: mpsc::Receiver<InputEvent>) -> JoinHandle<DispatchStats> {
        tokio::task::spawn_blocking(move || self.run(receiver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grbl::transport::tests::ScriptedTransport;
    use crate::grbl::SerialLink;
    use std::sync::{Arc, Mutex};

    fn ev(axes: &[i32], buttons: &[u8]) -> InputEvent {
        InputEvent::new(axes.to_vec(), buttons.iter().copied())
    }

    fn dispatcher(replies: &[&str]) -> (Dispatcher, Arc<Mutex<Vec<u8>>>) {
        let transport = ScriptedTransport::replying(replies);
        let written = transport.written();
        let client = ProtocolClient::new(SerialLink::from_transport("test", transport));
        (Dispatcher::new(client), written)
    }

    fn sent(written: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8(written.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn low_buttons_move_to_segments() {
        for button in 0..SEGMENT_BUTTONS {
            assert_eq!(
                route(&ev(&[0, 0], &[button])),
                Route::Send(Command::MoveToSegment(button))
            );
        }

        let (mut dispatcher, written) = dispatcher(&["ok\r\n"]);
        let response = dispatcher.dispatch(&ev(&[0, 0], &[2])).unwrap().unwrap();
        assert_eq!(sent(&written), "G90 G00 Z-356\n");
        assert_eq!(response.as_str(), "ok\r\n");
    }

    #[test]
    fn bumper_chord_sets_home_in_any_order() {
        assert_eq!(route(&ev(&[0, 0], &[5, 4])), Route::Send(Command::Home));

        let (mut dispatcher, written) = dispatcher(&[]);
        dispatcher.dispatch(&ev(&[0, 0], &[4, 5]));
        assert_eq!(sent(&written), "G10 L20 P1 Z0\n");
    }

    #[test]
    fn positive_deflection_jogs_towards_negative_z() {
        let (mut dispatcher, written) = dispatcher(&[]);
        let response = dispatcher.dispatch(&ev(&[3, 0], &[])).unwrap().unwrap();
        assert_eq!(sent(&written), "G91 G00 Z-5\n");
        assert!(response.is_empty());
        assert_eq!(dispatcher.stats().sent, 1);
    }

    #[test]
    fn negative_deflection_jogs_towards_positive_z() {
        let (mut dispatcher, written) = dispatcher(&[]);
        dispatcher.dispatch(&ev(&[-1, 0], &[]));
        assert_eq!(sent(&written), "G91 G00 Z5\n");
    }

    #[test]
    fn unbound_single_button_does_not_fall_through_to_jog() {
        assert_eq!(route(&ev(&[20_000, 0], &[7])), Route::Ignored);
        assert_eq!(route(&ev(&[0, 0], &[4])), Route::Ignored);

        let (mut dispatcher, written) = dispatcher(&[]);
        assert!(dispatcher.dispatch(&ev(&[20_000, 0], &[7])).is_none());
        assert!(sent(&written).is_empty());
        assert_eq!(dispatcher.stats().skipped, 1);
    }

    #[test]
    fn only_axis_zero_drives_jogging() {
        assert_eq!(route(&ev(&[0, 900], &[])), Route::Unmapped);
        assert_eq!(route(&ev(&[0, 0], &[1, 2])), Route::Unmapped);
        assert_eq!(route(&ev(&[], &[])), Route::Unmapped);
    }

    #[test]
    fn chords_other_than_home_fall_through_to_the_stick() {
        assert_eq!(
            route(&ev(&[-300, 0], &[0, 1])),
            Route::Send(Command::JogPositive)
        );
        assert_eq!(route(&ev(&[0, 0], &[4, 5, 6])), Route::Unmapped);
    }

    #[test]
    fn write_failures_are_counted_and_survived() {
        let transport = ScriptedTransport::failing_writes();
        let client = ProtocolClient::new(SerialLink::from_transport("test", transport));
        let mut dispatcher = Dispatcher::new(client);

        assert!(dispatcher.dispatch(&ev(&[1, 0], &[])).unwrap().is_err());
        assert!(dispatcher.dispatch(&ev(&[0, 0], &[1])).unwrap().is_err());
        assert_eq!(
            dispatcher.stats(),
            DispatchStats {
                sent: 0,
                failed: 2,
                skipped: 0
            }
        );
    }

    #[test]
    fn run_serves_until_sender_drops() {
        let (dispatcher, written) = dispatcher(&["ok", "", "ok", ""]);
        let (tx, rx) = mpsc::channel(1);

        let worker = std::thread::spawn(move || dispatcher.run(rx));
        tx.blocking_send(ev(&[0, 0], &[1])).unwrap();
        tx.blocking_send(ev(&[0, 0], &[9])).unwrap();
        tx.blocking_send(ev(&[-8, 0], &[])).unwrap();
        drop(tx);

        let stats = worker.join().unwrap();
        assert_eq!(stats.sent, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(sent(&written), "G90 G00 Z-178\nG91 G00 Z5\n");
    }
}
