use crate::api::models::Message;

/// What [`ConversationStore::append`] did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// A message with the same server id is already stored.
    Duplicate,
    /// The server copy replaced a pending optimistic message at this index.
    Reconciled(usize),
}

/// Messages of the open conversation, in arrival order.
#[derive(Debug, Default, Clone)]
pub struct ConversationStore {
    messages: Vec<Message>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Discard everything and take `messages` as-is.
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Add a message at the end.
    ///
    /// A message with an id already present is dropped. A persisted message
    /// echoing one of our pending optimistic sends (same sender, receiver and
    /// content, no id yet) takes the place of the oldest such entry.
    pub fn append(&mut self, message: Message) -> AppendOutcome {
        if let Some(id) = message.id.as_deref() {
            if self.messages.iter().any(|m| m.id.as_deref() == Some(id)) {
                return AppendOutcome::Duplicate;
            }
            let pending = self.messages.iter().position(|m| {
                m.id.is_none()
                    && m.sender == message.sender
                    && m.receiver == message.receiver
                    && m.content == message.content
            });
            if let Some(idx) = pending {
                self.messages[idx] = message;
                return AppendOutcome::Reconciled(idx);
            }
        }
        self.messages.push(message);
        AppendOutcome::Appended
    }
}
