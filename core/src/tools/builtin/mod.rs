//! Built-in tool implementations (spec.md §4.2, §1 "external collaborator"
//! ports). Notes/memory/scheduling/undo are concrete, in-scope logic over
//! the keyed [`crate::store::Store`]; calendar, messaging, and web wrap
//! ports whose real backends (a calendar SDK, a bot API client, a search
//! API / HTTP fetcher) live outside this crate per spec.md §1 Non-goals.

pub mod calendar;
pub mod code;
pub mod memory;
pub mod messaging;
pub mod notes;
pub mod scheduling;
pub mod terminal;
pub mod undo;
pub mod web;

pub use calendar::{CalendarBackend, CalendarEvent, CreateCalendarEvent};
pub use code::RunCode;
pub use memory::{ListMemories, Recall, Remember};
pub use messaging::SendTelegramMessage;
pub use notes::{CreateNote, DeleteNote, SearchNotes};
pub use scheduling::{CancelReminder, SetReminder};
pub use terminal::RunTerminalCommand;
pub use undo::UndoLast;
pub use web::{FetchWebpage, SearchResult, WebClient, WebSearch};
