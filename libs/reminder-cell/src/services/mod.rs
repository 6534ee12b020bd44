pub mod sweep;
pub mod window;
pub mod worker;

pub use sweep::ReminderSweepService;
pub use window::due_windows;
pub use worker::ReminderWorker;
