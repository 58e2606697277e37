pub mod alarm_notifier;
pub mod drowsiness_tracker;
pub mod frame_clock;
