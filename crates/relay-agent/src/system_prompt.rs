//! System Prompt Composition (spec.md §4.5).
//!
//! Grounded on `tyler/models/agent.py`'s `AgentPrompt.system_prompt(purpose,
//! name, notes)`: a fresh prompt is computed from `(name, purpose, notes,
//! current_date)` every turn, but never rewritten mid-turn if one is
//! already present at sequence 0 (that check lives in the loop, since it
//! needs to inspect the thread).

use chrono::{DateTime, Utc};

/// Renders the system prompt text from the agent's identity fields and the
/// current date. This crate does not decide *whether* to inject it — that
/// policy (idempotent per turn) lives in `crate::loop_::Agent::go`.
pub fn render(name: &str, purpose: &str, notes: &str, current_date: DateTime<Utc>) -> String {
    let mut prompt = format!("You are {name}.\n\nPurpose: {purpose}");
    if !notes.is_empty() {
        prompt.push_str(&format!("\n\nNotes: {notes}"));
    }
    prompt.push_str(&format!("\n\nCurrent date: {}", current_date.format("%Y-%m-%d")));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_name_purpose_notes_and_date() {
        let date = DateTime::parse_from_rfc3339("2026-07-28T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let prompt = render("Relay", "Answer concisely", "Be terse.", date);
        assert!(prompt.contains("Relay"));
        assert!(prompt.contains("Answer concisely"));
        assert!(prompt.contains("Be terse."));
        assert!(prompt.contains("2026-07-28"));
    }
}
