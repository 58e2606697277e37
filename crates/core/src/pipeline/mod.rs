pub mod capture_session;
pub mod monitor_session_use_case;
pub mod session_logger;
pub mod stop_signal;
