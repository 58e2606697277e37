use crate::monitoring::domain::drowsiness_tracker::TrackerState;

/// Receives alarm edges from the monitoring loop.
///
/// Called once per transition, never per frame, so implementations may do
/// comparatively expensive work (sound, notifications).
pub trait AlarmNotifier: Send {
    fn alarm_raised(&mut self, state: &TrackerState);
    fn alarm_cleared(&mut self, state: &TrackerState);
}

/// Notifier that ignores every transition.
pub struct NullAlarmNotifier;

impl AlarmNotifier for NullAlarmNotifier {
    fn alarm_raised(&mut self, _state: &TrackerState) {}
    fn alarm_cleared(&mut self, _state: &TrackerState) {}
}

impl AlarmNotifier for Vec<Box<dyn AlarmNotifier>> {
    fn alarm_raised(&mut self, state: &TrackerState) {
        for notifier in self.iter_mut() {
            notifier.alarm_raised(state);
        }
    }

    fn alarm_cleared(&mut self, state: &TrackerState) {
        for notifier in self.iter_mut() {
            notifier.alarm_cleared(state);
        }
    }
}
