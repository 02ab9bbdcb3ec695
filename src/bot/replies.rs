use std::time::Duration;

pub struct Replies;

impl Replies {
    pub fn on_cooldown(user: &str, remaining: Duration) -> String {
        let secs = remaining.as_secs_f64().ceil().max(1.0) as u64;
        format!("⏳ {user} slow down, try again in {secs}s")
    }

    pub fn owner_only(user: &str, command: &str) -> String {
        format!("❌ {user} `{command}` is owner only")
    }

    pub fn pong() -> String {
        "🏓 Pong!".to_string()
    }

    pub fn echo_prompt(user: &str) -> String {
        format!("📋 {user} send your next message and I'll repeat it")
    }

    pub fn echo_timeout(user: &str) -> String {
        format!("💀 {user} you took too long, echo cancelled")
    }

    pub fn echo_busy(user: &str) -> String {
        format!("❌ {user} you already have an echo waiting")
    }

    pub fn link_warning(user: &str) -> String {
        format!("⚠️ {user} invite links are not allowed here")
    }

    pub fn cooldown_reset(key: &str) -> String {
        format!("✅ Cooldown `{key}` cleared")
    }

    pub fn usage(usage: &str) -> String {
        format!("Usage: {usage}")
    }
}
