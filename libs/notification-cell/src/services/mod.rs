pub mod inbox;

pub use inbox::NotificationService;
