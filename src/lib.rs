//! Doctor-patient messaging client for the MediHub API: doctor directory,
//! per-conversation message history and live delivery over a WebSocket.

pub mod api;
pub mod app;
pub mod channel;
pub mod chat;
pub mod directory;
pub mod error;
pub mod storage;
pub mod ui;
pub mod utils;

pub use api::client::ApiClient;
pub use api::models::{Message, Partner};
pub use app::Settings;
pub use channel::{ConnectionManager, LoopbackChannel, RealtimeChannel, Subscription};
pub use chat::{ChatView, ConversationStore, Notice, Outbound, Variant, ViewEvent, ViewState};
pub use error::{ChatError, Result};
