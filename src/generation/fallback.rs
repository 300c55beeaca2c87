//! Deterministic keyword responder used when the language model is unreachable.

/// Lowercase substring → canned reply. Checked in order; first match wins.
const KEYWORD_REPLIES: &[(&str, &str)] = &[
    (
        "hello",
        "Hello! It's great to hear from you. How can I help you today?",
    ),
    (
        "good morning",
        "Good morning! I hope your day is off to a great start.",
    ),
    (
        "how are you",
        "I'm doing well, thanks for asking! How are you doing?",
    ),
    (
        "thank you",
        "You're welcome! Is there anything else I can help you with?",
    ),
    (
        "your name",
        "I'm your voice assistant. I'm here to chat and help out however I can.",
    ),
    (
        "time",
        "I can't check the clock right now, but your device should show the current time.",
    ),
    (
        "weather",
        "I can't look up the weather at the moment. A weather app will have the latest forecast.",
    ),
    (
        "joke",
        "Why don't scientists trust atoms? Because they make up everything!",
    ),
    (
        "help",
        "I'm here to help! Ask me a question or just tell me what's on your mind.",
    ),
    ("bye", "Goodbye! It was nice talking with you."),
];

/// Keyword table responder.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordResponder;

impl KeywordResponder {
    pub fn new() -> Self {
        Self
    }

    /// Pick a canned reply for `transcript`, or echo it back with an apology.
    pub fn respond(&self, transcript: &str) -> String {
        let lowered = transcript.to_lowercase();
        KEYWORD_REPLIES
            .iter()
            .find(|(keyword, _)| lowered.contains(keyword))
            .map(|(_, reply)| reply.to_string())
            .unwrap_or_else(|| {
                format!(
                    "I heard you say \"{}\". I'm having trouble connecting to my AI service right now, but I'm still here to help!",
                    transcript.trim()
                )
            })
    }
}
