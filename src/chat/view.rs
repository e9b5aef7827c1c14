//! Conversation state machine shared by the full-page and modal chat views.
//!
//! All mutation happens through `&mut self` on the view's own loop: network
//! results and channel pushes arrive as [`ViewEvent`]s on the view's queue and
//! are applied by [`ChatView::apply`]. Each partner selection gets a fresh
//! [`RequestToken`]; results carrying an older token are dropped.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::api::models::{Message, Partner};
use crate::channel::{RealtimeChannel, Subscription};
use crate::chat::store::{AppendOutcome, ConversationStore};
use crate::error::{ChatError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Sends go straight to the channel and are appended optimistically.
    Page,
    /// Sends are persisted over REST first, then emitted and appended.
    Modal,
}

/// Identifies one partner selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    seq: u64,
    partner_id: String,
}

impl RequestToken {
    pub fn partner_id(&self) -> &str {
        &self.partner_id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Idle,
    Loading { partner: Partner },
    Ready { partner: Partner },
    Failed { partner: Partner, reason: String },
}

impl ViewState {
    pub fn partner(&self) -> Option<&Partner> {
        match self {
            ViewState::Idle => None,
            ViewState::Loading { partner }
            | ViewState::Ready { partner }
            | ViewState::Failed { partner, .. } => Some(partner),
        }
    }
}

#[derive(Debug)]
pub enum ViewEvent {
    Inbound(Message),
    History { token: RequestToken, result: Result<Vec<Message>> },
    Persisted { token: RequestToken, result: Result<Message> },
}

/// History fetch the caller must run for a new selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub token: RequestToken,
    pub partner_id: String,
}

/// REST send the caller must run for the modal variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistRequest {
    pub token: RequestToken,
    pub receiver_id: String,
    pub content: String,
}

#[derive(Debug)]
pub enum Outbound {
    Emitted(Message),
    Persist(PersistRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A transient, user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn error(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, text: text.into() }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Warning, text: text.into() }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, text: text.into() }
    }
}

pub struct ChatView {
    variant: Variant,
    current_user_id: String,
    channel: Arc<dyn RealtimeChannel>,
    state: ViewState,
    selection: Option<RequestToken>,
    store: ConversationStore,
    subscription: Option<Subscription>,
    seq: u64,
    tx: mpsc::UnboundedSender<ViewEvent>,
    rx: mpsc::UnboundedReceiver<ViewEvent>,
}

impl ChatView {
    pub fn new(variant: Variant, current_user_id: &str, channel: Arc<dyn RealtimeChannel>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            variant,
            current_user_id: current_user_id.to_string(),
            channel,
            state: ViewState::Idle,
            selection: None,
            store: ConversationStore::new(),
            subscription: None,
            seq: 0,
            tx,
            rx,
        }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn current_user_id(&self) -> &str {
        &self.current_user_id
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn active_partner(&self) -> Option<&Partner> {
        self.state.partner()
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    /// Sender for results produced off the view loop.
    pub fn event_sender(&self) -> mpsc::UnboundedSender<ViewEvent> {
        self.tx.clone()
    }

    pub async fn next_event(&mut self) -> Option<ViewEvent> {
        self.rx.recv().await
    }

    /// Apply every event already queued, returning the notices they raised.
    pub fn drain_pending(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            notices.extend(self.apply(event));
        }
        notices
    }

    fn is_current(&self, token: &RequestToken) -> bool {
        self.selection.as_ref() == Some(token)
    }

    /// Make `partner` the open conversation.
    ///
    /// The previous handler is removed before the new one is installed and
    /// the store is emptied immediately, so nothing of the previous partner
    /// stays visible while the new history loads.
    pub fn select_partner(&mut self, partner: Partner) -> HistoryRequest {
        self.subscription = None;
        self.store.clear();
        self.seq += 1;
        let token = RequestToken { seq: self.seq, partner_id: partner.id.clone() };

        self.channel.join(&partner.id);
        let tx = self.tx.clone();
        let partner_id = partner.id.clone();
        self.subscription = Some(self.channel.on_receive(Box::new(move |msg: &Message| {
            if msg.involves(&partner_id) {
                let _ = tx.send(ViewEvent::Inbound(msg.clone()));
            } else {
                debug!("Discarding push for another conversation ({} -> {})", msg.sender, msg.receiver);
            }
        })));

        info!("Opening conversation with {}", partner.id);
        self.state = ViewState::Loading { partner };
        self.selection = Some(token.clone());
        HistoryRequest { partner_id: token.partner_id.clone(), token }
    }

    /// Tear down: deregister the handler and forget the conversation.
    pub fn close(&mut self) {
        if let Some(partner) = self.active_partner() {
            info!("Closing conversation with {}", partner.id);
        }
        self.subscription = None;
        self.selection = None;
        self.store.clear();
        self.state = ViewState::Idle;
    }

    pub fn apply(&mut self, event: ViewEvent) -> Option<Notice> {
        match event {
            ViewEvent::Inbound(message) => {
                self.receive(message);
                None
            }
            ViewEvent::History { token, result } => self.apply_history(token, result),
            ViewEvent::Persisted { token, result } => self.apply_persisted(token, result),
        }
    }

    fn receive(&mut self, message: Message) {
        let Some(partner) = self.state.partner() else {
            debug!("Push with no open conversation dropped");
            return;
        };
        if !message.involves(&partner.id) {
            debug!("Push for {} dropped, {} is open", message.sender, partner.id);
            return;
        }
        if self.store.append(message) == AppendOutcome::Duplicate {
            debug!("Duplicate push ignored");
        }
    }

    fn apply_history(&mut self, token: RequestToken, result: Result<Vec<Message>>) -> Option<Notice> {
        if !self.is_current(&token) {
            debug!("Discarding stale history for {}", token.partner_id);
            return None;
        }
        let Some(partner) = self.state.partner().cloned() else {
            return None;
        };
        match result {
            Ok(messages) => {
                debug!("Loaded {} messages with {}", messages.len(), partner.id);
                self.store.replace(messages);
                self.state = ViewState::Ready { partner };
                None
            }
            Err(e) => {
                warn!("History for {} failed: {}", partner.id, e);
                self.store.clear();
                let reason = e.to_string();
                self.state = ViewState::Failed { partner, reason: reason.clone() };
                Some(Notice::error(format!("Could not load messages: {}", reason)))
            }
        }
    }

    fn apply_persisted(&mut self, token: RequestToken, result: Result<Message>) -> Option<Notice> {
        match result {
            Ok(message) if self.is_current(&token) => {
                self.channel.send(&(&message).into());
                self.store.append(message);
                None
            }
            Ok(_) => {
                warn!("Message to {} saved after the conversation was left", token.partner_id);
                None
            }
            Err(e) => {
                warn!("Send to {} failed: {}", token.partner_id, e);
                Some(Notice::error(format!("Message not sent: {}", e)))
            }
        }
    }

    /// Send `text` to the open conversation.
    ///
    /// Blank text is rejected without touching the network.
    pub fn send(&mut self, text: &str) -> Result<Outbound> {
        let content = text.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let (Some(partner), Some(token)) = (self.state.partner(), self.selection.clone()) else {
            return Err(ChatError::NoActivePartner);
        };
        match self.variant {
            Variant::Page => {
                let message = Message::optimistic(&self.current_user_id, &partner.id, content);
                self.channel.send(&(&message).into());
                self.store.append(message.clone());
                Ok(Outbound::Emitted(message))
            }
            Variant::Modal => Ok(Outbound::Persist(PersistRequest {
                receiver_id: partner.id.clone(),
                content: content.to_string(),
                token,
            })),
        }
    }
}
