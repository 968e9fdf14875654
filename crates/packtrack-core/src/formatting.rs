//! Telegram HTML helpers.

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Split an outbound message into chunks of at most `limit` bytes.
///
/// Prefers paragraph boundaries (`\n\n`), then line boundaries; a single line
/// longer than `limit` is cut on a char boundary. Our templates never open a
/// tag across a line break, so line-level cuts keep the HTML balanced.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.len() <= limit {
        return vec![text.to_string()];
    }

    let mut out = Vec::new();
    let mut chunk = String::new();

    for para in text.split("\n\n") {
        let sep = if chunk.is_empty() { "" } else { "\n\n" };
        if chunk.len() + sep.len() + para.len() <= limit {
            chunk.push_str(sep);
            chunk.push_str(para);
            continue;
        }

        flush(&mut out, &mut chunk);
        if para.len() <= limit {
            chunk.push_str(para);
            continue;
        }

        for line in para.split('\n') {
            let sep = if chunk.is_empty() { "" } else { "\n" };
            if chunk.len() + sep.len() + line.len() <= limit {
                chunk.push_str(sep);
                chunk.push_str(line);
                continue;
            }
            flush(&mut out, &mut chunk);
            let mut pieces = hard_cut(line, limit);
            if let Some(last) = pieces.pop() {
                out.extend(pieces);
                chunk = last;
            }
        }
    }

    flush(&mut out, &mut chunk);
    out
}

fn flush(out: &mut Vec<String>, chunk: &mut String) {
    if !chunk.trim().is_empty() {
        out.push(std::mem::take(chunk));
    } else {
        chunk.clear();
    }
}

fn hard_cut(line: &str, limit: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut cur = String::new();
    for ch in line.chars() {
        if cur.len() + ch.len_utf8() > limit {
            pieces.push(std::mem::take(&mut cur));
        }
        cur.push(ch);
    }
    if !cur.is_empty() {
        pieces.push(cur);
    }
    pieces
}
