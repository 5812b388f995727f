use crate::killboard::KillEvent;

/// Discord's per-message content limit.
pub const MAX_MESSAGE_LEN: usize = 2000;

/// Renders the alert text for a kill.
pub fn format_kill_alert(event: &KillEvent, link: &str) -> String {
    format!(
        "**New Kill Alert!**\n\n\
         **Player:** {}\n\
         **Target:** {}\n\
         **Location:** {}\n\
         **Timestamp:** {}\n\n\
         Check out the kill details: [View Kill]({})",
        event.killer_name,
        event.victim_name,
        event.location,
        event.display_timestamp(),
        link
    )
}

/// Splits `text` into chunks of at most `limit` characters, preferring line breaks.
///
/// A single line longer than `limit` is hard-split on character boundaries.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
