// oslona-core/src/normalizer.rs
//! Canonicalizes raw narrative text into the deterministic intermediate
//! form all detectors operate on.
//!
//! Operations run in a fixed order: ANSI escape stripping, homoglyph
//! folding, zero-width/control removal, obfuscation-marker expansion,
//! fragmented-run collapsing, whitespace canonicalization, digit-run
//! indexing. Normalization always succeeds with best-effort output and
//! is idempotent.

use once_cell::sync::Lazy;
use regex::Regex;
use strip_ansi_escapes::strip;

/// Canonical text plus an offset map back to raw-text byte positions.
///
/// The offset map exists so audit tooling can locate a decision against
/// the original input; it is never used to build output. Owned
/// exclusively by one pipeline invocation.
#[derive(Debug, Clone)]
pub struct NormalizedText {
    text: String,
    offset_map: Vec<usize>,
    digit_runs: Vec<DigitRun>,
}

/// A maximal run of digits with single space/hyphen/dot separators,
/// recorded in compacted form alongside the original text so separator
/// obfuscation cannot defeat format matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitRun {
    /// Byte range in the normalized text.
    pub start: usize,
    pub end: usize,
    /// The run with separators removed.
    pub digits: String,
}

impl NormalizedText {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn digit_runs(&self) -> &[DigitRun] {
        &self.digit_runs
    }

    /// Maps a normalized byte offset back to the raw input.
    pub fn to_raw_offset(&self, normalized_index: usize) -> usize {
        let idx = normalized_index.min(self.offset_map.len().saturating_sub(1));
        self.offset_map[idx]
    }
}

/// Intermediate (text, per-byte raw offset) buffer shared by the
/// normalization phases.
struct MappedBuffer {
    text: String,
    map: Vec<usize>,
}

impl MappedBuffer {
    fn with_capacity(cap: usize) -> Self {
        Self { text: String::with_capacity(cap), map: Vec::with_capacity(cap + 1) }
    }

    fn push_char(&mut self, ch: char, raw_index: usize) {
        let before = self.text.len();
        self.text.push(ch);
        for _ in before..self.text.len() {
            self.map.push(raw_index);
        }
    }

    fn push_str(&mut self, s: &str, raw_index: usize) {
        for ch in s.chars() {
            self.push_char(ch, raw_index);
        }
    }

    fn seal(mut self, raw_len: usize) -> (String, Vec<usize>) {
        self.map.push(raw_len);
        (self.text, self.map)
    }
}

/// Normalizes raw text. Infallible: anomalies degrade to best-effort
/// output, never to an error.
pub fn normalize(raw: &str) -> NormalizedText {
    let (stripped, strip_map) = strip_ansi(raw);
    let (folded, fold_map) = fold_chars(&stripped, &strip_map, raw.len());
    let (expanded, expand_map) = expand_obfuscation_markers(&folded, &fold_map, raw.len());
    let (collapsed, collapse_map) = collapse_fragmented_runs(&expanded, &expand_map, raw.len());
    let (text, offset_map) = canonicalize_whitespace(&collapsed, &collapse_map, raw.len());
    let digit_runs = index_digit_runs(&text);
    NormalizedText { text, offset_map, digit_runs }
}

/// Normalizes raw bytes, substituting U+FFFD for malformed UTF-8.
pub fn normalize_bytes(raw: &[u8]) -> NormalizedText {
    normalize(&String::from_utf8_lossy(raw))
}

/// Removes ANSI escape sequences, aligning the survivors back to their
/// raw byte positions.
fn strip_ansi(raw: &str) -> (String, Vec<usize>) {
    let stripped_bytes = strip(raw.as_bytes());
    let stripped = String::from_utf8_lossy(&stripped_bytes).into_owned();

    let mut buf = MappedBuffer::with_capacity(stripped.len());
    let mut raw_chars = raw.char_indices();
    let mut current = raw_chars.next();
    for ch in stripped.chars() {
        while let Some((raw_idx, raw_ch)) = current {
            current = raw_chars.next();
            if raw_ch == ch {
                buf.push_char(ch, raw_idx);
                break;
            }
        }
    }
    buf.seal(raw.len())
}

enum Fold {
    Keep,
    Drop,
    Char(char),
}

/// Folds visually confusable characters to a canonical form and drops
/// zero-width and control characters. The table maps onto characters
/// that fold to themselves, which keeps the phase idempotent.
fn fold_char(c: char) -> Fold {
    match c {
        // Zero-width and joiner characters used to split tokens.
        '\u{200B}'..='\u{200F}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}' => Fold::Drop,
        // Newline variants.
        '\u{0085}' | '\u{2028}' | '\u{2029}' => Fold::Char('\n'),
        // Space variants.
        '\u{00A0}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}' | '\t' => {
            Fold::Char(' ')
        }
        // Typographic dashes and minus.
        '\u{2010}'..='\u{2015}' | '\u{2212}' => Fold::Char('-'),
        // Typographic quotes.
        '\u{2018}' | '\u{2019}' | '\u{201A}' => Fold::Char('\''),
        '\u{201C}' | '\u{201D}' | '\u{201E}' => Fold::Char('"'),
        // Fullwidth ASCII block.
        '\u{FF01}'..='\u{FF5E}' => {
            Fold::Char(char::from_u32(c as u32 - 0xFEE0).unwrap_or(c))
        }
        // Cyrillic lookalikes.
        'а' => Fold::Char('a'),
        'е' => Fold::Char('e'),
        'о' => Fold::Char('o'),
        'р' => Fold::Char('p'),
        'с' => Fold::Char('c'),
        'у' => Fold::Char('y'),
        'х' => Fold::Char('x'),
        'і' => Fold::Char('i'),
        'ј' => Fold::Char('j'),
        'ѕ' => Fold::Char('s'),
        'А' => Fold::Char('A'),
        'В' => Fold::Char('B'),
        'Е' => Fold::Char('E'),
        'К' => Fold::Char('K'),
        'М' => Fold::Char('M'),
        'Н' => Fold::Char('H'),
        'О' => Fold::Char('O'),
        'Р' => Fold::Char('P'),
        'С' => Fold::Char('C'),
        'Т' => Fold::Char('T'),
        'У' => Fold::Char('Y'),
        'Х' => Fold::Char('X'),
        // Greek lookalikes.
        'ο' => Fold::Char('o'),
        'α' => Fold::Char('a'),
        'Α' => Fold::Char('A'),
        'Ε' => Fold::Char('E'),
        'Ι' => Fold::Char('I'),
        'Κ' => Fold::Char('K'),
        'Μ' => Fold::Char('M'),
        'Ν' => Fold::Char('N'),
        'Ο' => Fold::Char('O'),
        'Ρ' => Fold::Char('P'),
        'Τ' => Fold::Char('T'),
        'Χ' => Fold::Char('X'),
        _ if c.is_control() && c != '\n' && c != '\r' => Fold::Drop,
        _ => Fold::Keep,
    }
}

fn fold_chars(text: &str, map: &[usize], raw_len: usize) -> (String, Vec<usize>) {
    let mut buf = MappedBuffer::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        let raw_idx = map[idx];
        if ch == '\r' {
            // CRLF collapses into the LF; a lone CR becomes LF.
            if !matches!(chars.peek(), Some((_, '\n'))) {
                buf.push_char('\n', raw_idx);
            }
            continue;
        }
        match fold_char(ch) {
            Fold::Keep => buf.push_char(ch, raw_idx),
            Fold::Drop => {}
            Fold::Char(c) => buf.push_char(c, raw_idx),
        }
    }
    buf.seal(raw_len)
}

static AT_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[ ]*[\[({](?:at|małpa)[\])}][ ]*").unwrap()
});
static DOT_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[ ]*[\[({](?:dot|kropka)[\])}][ ]*").unwrap()
});

/// Expands known obfuscation markers, absorbing the surrounding spaces:
/// `jan [at] example [dot] com` becomes `jan@example.com`.
fn expand_obfuscation_markers(text: &str, map: &[usize], raw_len: usize) -> (String, Vec<usize>) {
    let mut buf = MappedBuffer::with_capacity(text.len());
    let mut cursor = 0usize;

    let mut replacements: Vec<(usize, usize, char)> = AT_MARKER
        .find_iter(text)
        .map(|m| (m.start(), m.end(), '@'))
        .chain(DOT_MARKER.find_iter(text).map(|m| (m.start(), m.end(), '.')))
        .collect();
    replacements.sort_by_key(|r| r.0);

    for (start, end, replacement) in replacements {
        if end <= cursor {
            continue;
        }
        // Adjacent markers can share absorbed spaces; clamp to the cursor.
        let start = start.max(cursor);
        for (idx, ch) in text[cursor..start].char_indices() {
            buf.push_char(ch, map[cursor + idx]);
        }
        buf.push_char(replacement, map[start]);
        cursor = end;
    }
    for (idx, ch) in text[cursor..].char_indices() {
        buf.push_char(ch, map[cursor + idx]);
    }
    buf.seal(raw_len)
}

/// Minimum number of single-character tokens before a spaced-out run is
/// collapsed. Two is too few: Polish uses real single-letter words
/// ("i", "w", "z"), and pairs like "a i" are ordinary text.
const MIN_FRAGMENT_RUN: usize = 3;

/// Collapses space-fragmented tokens: `j o h n` -> `john`.
fn collapse_fragmented_runs(text: &str, map: &[usize], raw_len: usize) -> (String, Vec<usize>) {
    // Single alphanumeric chars separated by single spaces, bounded on
    // both sides. Collected manually since the regex crate has no
    // lookaround.
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut singles: Vec<(usize, usize)> = Vec::new(); // (char index, byte index)
    for (i, &(byte_idx, ch)) in chars.iter().enumerate() {
        if !ch.is_alphanumeric() {
            continue;
        }
        let prev_ok = i == 0 || !chars[i - 1].1.is_alphanumeric();
        let next_ok = i + 1 == chars.len() || !chars[i + 1].1.is_alphanumeric();
        if prev_ok && next_ok {
            singles.push((i, byte_idx));
        }
    }

    // Group singles into runs where consecutive members are separated by
    // exactly one space.
    let mut drop_spaces: Vec<usize> = Vec::new(); // byte indices of spaces to remove
    let mut run: Vec<usize> = Vec::new(); // char indices
    let mut flush = |run: &mut Vec<usize>, drop_spaces: &mut Vec<usize>| {
        if run.len() >= MIN_FRAGMENT_RUN {
            for pair in run.windows(2) {
                // The byte between the two singles is the separator space.
                drop_spaces.push(chars[pair[0] + 1].0);
            }
        }
        run.clear();
    };
    for &(char_idx, _) in &singles {
        if let Some(&last) = run.last() {
            let adjacent = char_idx == last + 2 && chars[last + 1].1 == ' ';
            if !adjacent {
                flush(&mut run, &mut drop_spaces);
            }
        }
        run.push(char_idx);
    }
    flush(&mut run, &mut drop_spaces);

    let mut buf = MappedBuffer::with_capacity(text.len());
    let mut drop_iter = drop_spaces.iter().peekable();
    for (byte_idx, ch) in text.char_indices() {
        if drop_iter.peek() == Some(&&byte_idx) {
            drop_iter.next();
            continue;
        }
        buf.push_char(ch, map[byte_idx]);
    }
    buf.seal(raw_len)
}

/// Collapses space runs, limits blank lines, trims line-trailing spaces.
fn canonicalize_whitespace(text: &str, map: &[usize], raw_len: usize) -> (String, Vec<usize>) {
    let mut buf = MappedBuffer::with_capacity(text.len());
    let mut pending_space: Option<usize> = None;
    let mut newline_count = 0usize;

    for (byte_idx, ch) in text.char_indices() {
        match ch {
            ' ' => {
                pending_space.get_or_insert(map[byte_idx]);
            }
            '\n' => {
                pending_space = None; // drop line-trailing spaces
                if newline_count < 2 && !buf.text.is_empty() {
                    buf.push_char('\n', map[byte_idx]);
                }
                newline_count += 1;
            }
            _ => {
                if let Some(raw_idx) = pending_space.take() {
                    if !buf.text.is_empty() && !buf.text.ends_with('\n') {
                        buf.push_char(' ', raw_idx);
                    }
                }
                newline_count = 0;
                buf.push_char(ch, map[byte_idx]);
            }
        }
    }
    while buf.text.ends_with('\n') {
        buf.text.pop();
        buf.map.pop();
    }
    buf.seal(raw_len)
}

/// Records maximal digit runs (single ` `, `-`, `.` separators allowed)
/// whose compacted form is long enough to be an identifier candidate.
fn index_digit_runs(text: &str) -> Vec<DigitRun> {
    const MIN_DIGITS: usize = 9;
    let bytes = text.as_bytes();
    let mut runs = Vec::new();
    let mut i = 0usize;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        let mut digits = String::new();
        let mut last_digit_end = i;
        while i < bytes.len() {
            if bytes[i].is_ascii_digit() {
                digits.push(bytes[i] as char);
                i += 1;
                last_digit_end = i;
            } else if matches!(bytes[i], b' ' | b'-' | b'.')
                && i + 1 < bytes.len()
                && bytes[i + 1].is_ascii_digit()
            {
                i += 1;
            } else {
                break;
            }
        }
        if digits.len() >= MIN_DIGITS {
            runs.push(DigitRun { start, end: last_digit_end, digits });
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_is_idempotent() {
        let samples = [
            "Klient Jan Kowalski, PESEL 44051401359.",
            "j o h n [at] example [dot] com",
            "zwykły  tekst\r\nz\u{00A0}osobliwościami\u{200B}",
            "tel.\u{2013}500\u{2014}600\u{2212}700",
        ];
        for raw in samples {
            let once = normalize(raw);
            let twice = normalize(once.text());
            assert_eq!(once.text(), twice.text(), "input: {raw:?}");
        }
    }

    #[test]
    fn fragmented_email_collapses() {
        let n = normalize("kontakt: j o h n [at] example [dot] com dziękuję");
        assert!(n.text().contains("john@example.com"), "got: {}", n.text());
    }

    #[test]
    fn short_single_letter_runs_survive() {
        // "a i b" is ordinary Polish ("and"), must not be glued together,
        // but three or more fragments collapse.
        let n = normalize("opcja a i b");
        assert_eq!(n.text(), "opcja aib");
        let n = normalize("opcja a i");
        assert_eq!(n.text(), "opcja a i");
    }

    #[test]
    fn homoglyphs_fold_to_canonical_form() {
        // Cyrillic а/о inside a Latin word.
        let n = normalize("K\u{043E}w\u{0430}lski");
        assert_eq!(n.text(), "Kowalski");
    }

    #[test]
    fn zero_width_and_control_characters_are_removed() {
        let n = normalize("PE\u{200B}SEL\u{0007} 440");
        assert_eq!(n.text(), "PESEL 440");
    }

    #[test]
    fn ansi_escapes_are_stripped() {
        let n = normalize("\x1b[31mJan\x1b[0m Nowak");
        assert_eq!(n.text(), "Jan Nowak");
    }

    #[test]
    fn offset_map_points_back_into_raw_text() {
        let raw = "\x1b[31mJan\x1b[0m Nowak";
        let n = normalize(raw);
        let jan_pos = n.text().find("Jan").unwrap();
        assert_eq!(&raw[n.to_raw_offset(jan_pos)..][..3], "Jan");
    }

    #[test]
    fn digit_runs_are_indexed_in_compacted_form() {
        let n = normalize("PESEL 44 05 14 01 359 oraz NIP 123-456-32-18");
        let digits: Vec<&str> = n.digit_runs().iter().map(|r| r.digits.as_str()).collect();
        assert!(digits.contains(&"44051401359"));
        assert!(digits.contains(&"1234563218"));
    }

    #[test]
    fn malformed_bytes_never_panic() {
        let n = normalize_bytes(&[0x4A, 0x61, 0x6E, 0xFF, 0x21]);
        assert!(n.text().contains('\u{FFFD}'));
    }

    #[test]
    fn whitespace_is_canonicalized() {
        let n = normalize("linia  pierwsza   \n\n\n\nlinia druga");
        assert_eq!(n.text(), "linia pierwsza\n\nlinia druga");
    }
}
