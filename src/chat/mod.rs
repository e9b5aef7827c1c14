pub mod store;
pub mod timeline;
pub mod view;

pub use store::{AppendOutcome, ConversationStore};
pub use view::{ChatView, Notice, NoticeLevel, Outbound, ViewEvent, ViewState, Variant};
