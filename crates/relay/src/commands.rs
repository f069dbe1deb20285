//! Control commands answered directly by the relay.

use crate::completion::Capability;

pub const GREETING: &str = "Hello! I'm your AI assistant. Lets do some business.\n\n\
     Send me a message and I'll reply.\n\
     /clear - forget our conversation so far\n\
     /tools - list the tools I can use";
pub const HISTORY_CLEARED: &str = "Conversation history cleared.";
pub const NO_TOOLS: &str = "No MCP tools are currently available.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    Help,
    Clear,
    Tools,
}

impl Command {
    pub const ALL: [Self; 4] = [Self::Start, Self::Help, Self::Clear, Self::Tools];

    /// Exact match on the trimmed message text. `/clear now` or `/Clear`
    /// are ordinary messages.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "/start" => Some(Self::Start),
            "/help" => Some(Self::Help),
            "/clear" => Some(Self::Clear),
            "/tools" => Some(Self::Tools),
            _ => None,
        }
    }

    /// Name without the leading slash, as registered with the transport.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Clear => "clear",
            Self::Tools => "tools",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Start => "Start the conversation",
            Self::Help => "Show help",
            Self::Clear => "Clear conversation history",
            Self::Tools => "List available tools",
        }
    }
}

/// Reply for `/tools`.
#[must_use]
pub fn tools_reply(capabilities: &[Capability]) -> String {
    if capabilities.is_empty() {
        return NO_TOOLS.to_string();
    }
    let mut reply = String::from("Available MCP Tools:\n");
    for cap in capabilities {
        reply.push_str("\n• ");
        reply.push_str(&cap.name);
        if let Some(desc) = cap.description.as_deref().filter(|d| !d.is_empty()) {
            reply.push_str(": ");
            reply.push_str(desc);
        }
    }
    reply
}
