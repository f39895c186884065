pub mod chat_room;
pub mod class;
pub mod notification;
pub mod reminder_log;
pub mod user;

pub use chat_room::ChatRoomRepository;
pub use class::{ClassRepository, EnrollmentRepository};
pub use notification::NotificationRepository;
pub use reminder_log::ReminderLogRepository;
pub use user::UserRepository;
