pub mod booking;
pub mod counters;
pub mod lifecycle;
pub mod watcher;

pub use booking::AppointmentBookingService;
pub use counters::{pending_delta, CounterService};
pub use lifecycle::AppointmentLifecycleService;
pub use watcher::{AppointmentWatch, ObservedTransition, StatusWatcher};
