pub mod log_alarm_notifier;
