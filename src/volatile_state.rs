use serenity::all::MessageId;
use std::collections::VecDeque;

/// How many message ids to remember for duplicate suppression.
const RECENT_MESSAGES_MAX: usize = 10;

/// State which is lost across sessions
pub struct VolatileState {
    pub recent_messages: RecentMessages,
}

/// Messages a listener has already reacted to.  Gateway reconnects can replay events.
pub struct RecentMessages(VecDeque<MessageId>);

impl VolatileState {
    pub fn new() -> Self {
        Self {
            recent_messages: RecentMessages::new(),
        }
    }
}

impl RecentMessages {
    pub fn new() -> Self {
        Self(VecDeque::with_capacity(RECENT_MESSAGES_MAX))
    }

    /// Records `id`.  Returns false if it was already seen recently.
    pub fn first_sighting(&mut self, id: MessageId) -> bool {
        if self.0.contains(&id) {
            return false;
        }

        self.0.push_back(id);
        while self.0.len() > RECENT_MESSAGES_MAX {
            self.0.pop_front();
        }
        true
    }
}
