use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("token pattern is valid"));

/// Function words never counted as keywords. Fixed; not extensible per call.
pub const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "is", "are", "was", "were", "be", "been", "have", "has", "had", "do", "does", "did",
    "will", "would", "could", "should", "can", "this", "that", "these", "those", "it", "its",
    "as", "if", "not", "no", "so", "than", "too", "very", "just", "also", "的", "了", "我",
    "是", "在", "有", "和",
];

static STOP_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOP_WORDS.iter().copied().collect());

/// Lower-cased word tokens of two or more characters, stop words removed.
///
/// Runs of CJK characters carry no word boundaries, so they are broken at
/// stop characters and emitted as overlapping character bigrams.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut tokens = Vec::new();

    for word in TOKEN.find_iter(&lowered).map(|m| m.as_str()) {
        if !word.chars().any(is_cjk) {
            if !STOP_SET.contains(word) {
                tokens.push(word.to_string());
            }
            continue;
        }

        let mut segment: Vec<char> = Vec::new();
        for c in word.chars().chain(std::iter::once(' ')) {
            let mut buf = [0u8; 4];
            if c == ' ' || STOP_SET.contains(&*c.encode_utf8(&mut buf)) {
                tokens.extend(segment.windows(2).map(|w| w.iter().collect::<String>()));
                segment.clear();
            } else {
                segment.push(c);
            }
        }
    }
    tokens
}

pub(crate) fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4e00}'..='\u{9fff}' | '\u{3400}'..='\u{4dbf}')
}
