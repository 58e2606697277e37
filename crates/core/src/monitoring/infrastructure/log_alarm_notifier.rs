use std::io::Write;

use crate::monitoring::domain::alarm_notifier::AlarmNotifier;
use crate::monitoring::domain::drowsiness_tracker::TrackerState;

/// Reports alarm edges through the `log` facade.
pub struct LogAlarmNotifier;

impl AlarmNotifier for LogAlarmNotifier {
    fn alarm_raised(&mut self, state: &TrackerState) {
        log::warn!(
            "Drowsiness alarm raised: eyes closed for {:.1}s",
            state.closed_seconds()
        );
    }

    fn alarm_cleared(&mut self, _state: &TrackerState) {
        log::info!("Drowsiness alarm cleared");
    }
}

/// Rings the terminal bell when the alarm is raised.
pub struct TerminalBellNotifier<W: Write + Send> {
    out: W,
}

impl TerminalBellNotifier<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> TerminalBellNotifier<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> AlarmNotifier for TerminalBellNotifier<W> {
    fn alarm_raised(&mut self, _state: &TrackerState) {
        if let Err(e) = self.out.write_all(b"\x07").and_then(|_| self.out.flush()) {
            log::debug!("Terminal bell failed: {e}");
        }
    }

    fn alarm_cleared(&mut self, _state: &TrackerState) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bell_written_on_raise_only() {
        let mut notifier = TerminalBellNotifier::new(Vec::new());
        let state = TrackerState::default();
        notifier.alarm_raised(&state);
        notifier.alarm_cleared(&state);
        notifier.alarm_raised(&state);
        assert_eq!(notifier.out, b"\x07\x07");
    }

    #[test]
    fn test_log_notifier_does_not_panic() {
        let mut notifier = LogAlarmNotifier;
        let state = TrackerState::default();
        notifier.alarm_raised(&state);
        notifier.alarm_cleared(&state);
    }
}
