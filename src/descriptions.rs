// Project descriptions are revealed line by line. Each sentence becomes its own
// line so the stylesheet can stagger them.

/// Break `text` after every newline and after every period followed by
/// whitespace. Lines are trimmed; empty ones are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut after_period = false;
    for ch in text.chars() {
        if ch == '\n' || (after_period && ch.is_whitespace()) {
            push_line(&mut lines, &current);
            current.clear();
        } else {
            current.push(ch);
        }
        after_period = ch == '.';
    }
    push_line(&mut lines, &current);
    lines
}

fn push_line(lines: &mut Vec<String>, line: &str) {
    let line = line.trim();
    if !line.is_empty() {
        lines.push(line.to_string());
    }
}
