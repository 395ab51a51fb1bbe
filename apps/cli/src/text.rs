//! Text helpers shared by the stages: chunking for the LLM, file-safe names
//! and length-capped messages.

/// Largest chunk sent to the translator, in characters.
pub const TRANSLATE_CHUNK_CHARS: usize = 3300;
pub const TRANSLATE_CHUNK_OVERLAP: usize = 10;
/// Paragraph break first, then the Devanagari full stop.
pub const TRANSLATE_SEPARATORS: [char; 2] = ['\n', '।'];

/// Splits `text` into chunks of at most `chunk_size` characters.
///
/// Split points are tried in the order of `separators`; a piece with no
/// separator left is cut at a fixed width. Every chunk after the first
/// starts with the last `overlap` characters of the chunk before it.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize, separators: &[char]) -> Vec<String> {
    assert!(overlap < chunk_size, "overlap must be smaller than chunk_size");

    if text.trim().is_empty() {
        return Vec::new();
    }
    if char_len(text) <= chunk_size {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    split_recursive(text, chunk_size - overlap, separators, &mut pieces);

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for piece in pieces {
        let piece_len = char_len(piece);
        if current_len + piece_len > chunk_size && current_len > 0 {
            let carried = tail(&current, overlap).to_string();
            chunks.push(std::mem::take(&mut current));
            current_len = char_len(&carried);
            current = carried;
        }
        current.push_str(piece);
        current_len += piece_len;
    }
    if !current.trim().is_empty() {
        chunks.push(current);
    }

    chunks.retain(|c| !c.trim().is_empty());
    chunks
}

fn split_recursive<'a>(text: &'a str, limit: usize, separators: &[char], out: &mut Vec<&'a str>) {
    if char_len(text) <= limit {
        out.push(text);
        return;
    }

    match separators.split_first() {
        Some((sep, rest)) => {
            for part in text.split_inclusive(*sep) {
                split_recursive(part, limit, rest, out);
            }
        }
        None => {
            let mut start = 0;
            for (count, (idx, _)) in text.char_indices().enumerate() {
                if count > 0 && count % limit == 0 {
                    out.push(&text[start..idx]);
                    start = idx;
                }
            }
            out.push(&text[start..]);
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Last `n` characters of `s`.
pub fn tail(s: &str, n: usize) -> &str {
    let len = char_len(s);
    if len <= n {
        return s;
    }
    let start = s
        .char_indices()
        .nth(len - n)
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    &s[start..]
}

/// First `n` characters of `s`.
pub fn head(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Story name used in output file names: the title without whitespace or
/// ASCII punctuation.
pub fn story_name(title: &str) -> String {
    let name: String = title
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_ascii_punctuation())
        .collect();
    if name.is_empty() {
        "story".to_string()
    } else {
        name
    }
}

/// File-safe slug for a scenery title: non-word characters dropped and
/// whitespace runs collapsed into `-`.
pub fn slugify(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Collapses runs of whitespace into a single space.
pub fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = split_text("छोटी कहानी।", 3300, 10, &TRANSLATE_SEPARATORS);
        assert_eq!(chunks, vec!["छोटी कहानी।".to_string()]);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(split_text("  \n ", 100, 10, &TRANSLATE_SEPARATORS).is_empty());
    }

    #[test]
    fn long_text_respects_size_and_overlap() {
        let line = "एक राजा था जो बहुत दयालु था। ";
        let text = (0..400).map(|i| format!("{line}{i}\n")).collect::<String>();

        let chunks = split_text(&text, 3300, 10, &TRANSLATE_SEPARATORS);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 3300);
        }
        for pair in chunks.windows(2) {
            assert!(pair[1].starts_with(tail(&pair[0], 10)));
        }
    }

    #[test]
    fn falls_back_to_devanagari_full_stop() {
        let sentence = "कौआ प्यासा था।";
        let text = sentence.repeat(50);
        let chunks = split_text(&text, 100, 10, &TRANSLATE_SEPARATORS);
        assert!(chunks.len() > 1);
        assert!(chunks[0].ends_with('।'));
    }

    #[test]
    fn unbroken_text_is_cut_at_fixed_width() {
        let text = "a".repeat(250);
        let chunks = split_text(&text, 100, 10, &TRANSLATE_SEPARATORS);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
        let rebuilt: usize = chunks.iter().map(|c| c.len()).sum::<usize>() - 10 * (chunks.len() - 1);
        assert_eq!(rebuilt, 250);
    }

    #[test]
    fn story_name_drops_spaces_and_punctuation() {
        assert_eq!(story_name("पहली पुतली; रत्नमंजरी"), "पहलीपुतलीरत्नमंजरी");
        assert_eq!(story_name("  ...  "), "story");
    }

    #[test]
    fn slugify_collapses_whitespace() {
        assert_eq!(slugify("Brahmin's  Prophecy"), "Brahmins-Prophecy");
        assert_eq!(slugify("Palace Unveiling!"), "Palace-Unveiling");
    }

    #[test]
    fn head_and_tail_count_chars() {
        assert_eq!(head("नमस्ते", 2), "नम");
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("ab", 3), "ab");
    }
}
