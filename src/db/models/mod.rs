pub mod chat;
pub mod class;
pub mod notification;
pub mod reminder_log;
pub mod user;

pub use self::chat::*;
pub use self::class::*;
pub use self::notification::*;
pub use self::reminder_log::*;
pub use self::user::*;
