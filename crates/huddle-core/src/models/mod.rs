pub mod board;
pub mod calendar_event;
pub mod message;
pub mod presence;
pub mod suggestion;
pub mod task;

pub use board::{Board, BoardTab};
pub use calendar_event::CalendarEvent;
pub use message::Message;
pub use presence::PresenceRecord;
pub use suggestion::Suggestion;
pub use task::{Task, TaskStatus};
