use daachorse::DoubleArrayAhoCorasick;

/// Scans for label keywords near a candidate match with word-boundary
/// awareness. Used by pattern rules whose confidence depends on a
/// nearby contextual cue (e.g. a tax-ID marker before the digits).
pub struct KeywordScanner {
    automaton: Option<DoubleArrayAhoCorasick<u32>>,
}

impl std::fmt::Debug for KeywordScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordScanner")
            .field("automaton", &"<DoubleArrayAhoCorasick>")
            .finish()
    }
}

impl KeywordScanner {
    /// Builds a scanner over the given keywords. Keywords are matched
    /// case-insensitively (stored lowercase, windows lowercased on scan).
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        patterns.sort();
        patterns.dedup();

        let automaton = if patterns.is_empty() {
            None
        } else {
            Some(
                DoubleArrayAhoCorasick::new(patterns)
                    .expect("failed to build Aho-Corasick automaton for keyword scanning"),
            )
        };
        Self { automaton }
    }

    pub fn is_empty(&self) -> bool {
        self.automaton.is_none()
    }

    /// Scans the window preceding `token_start` for any keyword.
    pub fn scan_preceding(&self, text: &[u8], token_start: usize, window_size: usize) -> bool {
        if token_start == 0 {
            return false;
        }
        let start = token_start.saturating_sub(window_size);
        self.matches_window(&text[start..token_start.min(text.len())])
    }

    /// Checks whether any keyword occurs in the window, requiring word
    /// boundaries so that "nip" does not match inside "śnipiszki".
    pub fn matches_window(&self, window: &[u8]) -> bool {
        let Some(automaton) = &self.automaton else {
            return false;
        };
        let lowered = window.to_ascii_lowercase();
        for matched in automaton.find_overlapping_iter(&lowered) {
            let m_start = matched.start();
            let m_end = matched.end();
            let prefix_ok = m_start == 0 || !lowered[m_start - 1].is_ascii_alphanumeric();
            let suffix_ok = m_end == lowered.len() || !lowered[m_end].is_ascii_alphanumeric();
            if prefix_ok && suffix_ok {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_found_in_preceding_window() {
        let scanner = KeywordScanner::new(["nip", "vat"]);
        let text = "NIP: 1234563218".as_bytes();
        assert!(scanner.scan_preceding(text, 5, 16));
    }

    #[test]
    fn keyword_requires_word_boundary() {
        let scanner = KeywordScanner::new(["id"]);
        assert!(!scanner.matches_window(b"solidny produkt"));
        assert!(scanner.matches_window(b"id transakcji"));
    }

    #[test]
    fn empty_scanner_never_matches() {
        let scanner = KeywordScanner::new(Vec::<String>::new());
        assert!(scanner.is_empty());
        assert!(!scanner.matches_window(b"nip 123"));
    }
}
