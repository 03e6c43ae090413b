use std::sync::Arc;

use daachorse::DoubleArrayAhoCorasick;

use crate::lemma;
use crate::lexicon::Lexicon;

/// A dictionary hit in the scanned text. Offsets are byte positions in
/// the original (non-lowercased) input; `entry` indexes into the
/// backing [`Lexicon`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexiconMatch {
    pub start: usize,
    pub end: usize,
    pub entry: u32,
}

/// Maps byte offsets of a lowercased copy back to the source string.
#[derive(Debug)]
struct LowercaseMap {
    lower: String,
    map: Vec<usize>,
}

impl LowercaseMap {
    fn new(original: &str) -> Self {
        let mut lower = String::with_capacity(original.len());
        let mut map = Vec::with_capacity(original.len() + 1);
        for (idx, ch) in original.char_indices() {
            for low in ch.to_lowercase() {
                let before = lower.len();
                lower.push(low);
                for _ in before..lower.len() {
                    map.push(idx);
                }
            }
        }
        map.push(original.len());
        Self { lower, map }
    }

    fn map_index(&self, lower_index: usize) -> usize {
        let idx = lower_index.min(self.map.len().saturating_sub(1));
        self.map[idx]
    }
}

/// Scans text for lexicon entries: exact (possibly multi-word) surface
/// forms through an Aho-Corasick automaton, inflected single tokens
/// through suffix lemmatization.
pub struct LexiconMatcher {
    lexicon: Arc<Lexicon>,
    automaton: Option<DoubleArrayAhoCorasick<u32>>,
    surfaces: Vec<String>,
}

impl std::fmt::Debug for LexiconMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LexiconMatcher")
            .field("surfaces", &self.surfaces.len())
            .finish()
    }
}

impl LexiconMatcher {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        let mut surfaces: Vec<String> = lexicon
            .entries()
            .iter()
            .map(|e| e.lemma.to_lowercase())
            .collect();
        surfaces.sort();
        surfaces.dedup();

        let automaton = if surfaces.is_empty() {
            None
        } else {
            Some(
                DoubleArrayAhoCorasick::new(surfaces.iter())
                    .expect("failed to build Aho-Corasick automaton over lexicon surfaces"),
            )
        };

        Self { lexicon, automaton, surfaces }
    }

    pub fn lexicon(&self) -> &Arc<Lexicon> {
        &self.lexicon
    }

    /// Finds all dictionary hits in `text`. Matches may overlap each
    /// other; the caller's span unification resolves conflicts.
    pub fn find(&self, text: &str) -> Vec<LexiconMatch> {
        let lowered = LowercaseMap::new(text);
        let mut out = Vec::new();

        if let Some(automaton) = &self.automaton {
            for m in automaton.find_overlapping_iter(&lowered.lower) {
                if !word_bounded(&lowered.lower, m.start(), m.end()) {
                    continue;
                }
                let surface = &self.surfaces[m.value() as usize];
                let start = lowered.map_index(m.start());
                let end = lowered.map_index(m.end());
                for &entry in self.lexicon.entry_ids(surface) {
                    out.push(LexiconMatch { start, end, entry });
                }
            }
        }

        self.find_inflected(text, &mut out);
        out.sort_by_key(|m| (m.start, m.end, m.entry));
        out
    }

    /// Second pass: single tokens whose exact form is unknown but whose
    /// suffix-rewritten base form is in the lexicon.
    fn find_inflected(&self, text: &str, out: &mut Vec<LexiconMatch>) {
        for (start, end, token) in word_tokens(text) {
            let token_lower = token.to_lowercase();
            if self.lexicon.contains(&token_lower) {
                continue; // already found by the automaton
            }
            for candidate in lemma::candidates(&token_lower) {
                let ids = self.lexicon.entry_ids(&candidate);
                if !ids.is_empty() {
                    for &entry in ids {
                        out.push(LexiconMatch { start, end, entry });
                    }
                    break;
                }
            }
        }
    }
}

/// Maximal alphabetic runs with their byte offsets.
fn word_tokens(text: &str) -> impl Iterator<Item = (usize, usize, &str)> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    for (idx, ch) in text.char_indices() {
        if ch.is_alphabetic() {
            start.get_or_insert(idx);
        } else if let Some(s) = start.take() {
            tokens.push((s, idx, &text[s..idx]));
        }
    }
    if let Some(s) = start {
        tokens.push((s, text.len(), &text[s..]));
    }
    tokens.into_iter()
}

fn word_bounded(haystack: &str, start: usize, end: usize) -> bool {
    let prefix_ok = haystack[..start]
        .chars()
        .next_back()
        .map_or(true, |c| !c.is_alphanumeric());
    let suffix_ok = haystack[end..]
        .chars()
        .next()
        .map_or(true, |c| !c.is_alphanumeric());
    prefix_ok && suffix_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::{EntryKind, LexiconBuilder, Tier};

    fn matcher(entries: &[(EntryKind, &str)]) -> LexiconMatcher {
        let mut b = LexiconBuilder::new("test");
        for (kind, lemma) in entries {
            b.add(*kind, Tier::Curated, false, *lemma);
        }
        LexiconMatcher::new(Arc::new(b.build()))
    }

    #[test]
    fn exact_surface_form_matches_case_insensitively() {
        let m = matcher(&[(EntryKind::Surname, "Kowalski")]);
        let hits = m.find("Pan KOWALSKI złożył skargę.");
        assert_eq!(hits.len(), 1);
        assert_eq!(&"Pan KOWALSKI złożył skargę."[hits[0].start..hits[0].end], "KOWALSKI");
    }

    #[test]
    fn embedded_words_do_not_match_inside_longer_words() {
        let m = matcher(&[(EntryKind::FirstName, "Jan")]);
        assert!(m.find("Janusz pisze").is_empty());
    }

    #[test]
    fn inflected_token_resolves_to_lemma() {
        let m = matcher(&[(EntryKind::Surname, "Kowalski")]);
        let text = "sprawa pana Kowalskiego";
        let hits = m.find(text);
        assert_eq!(hits.len(), 1);
        assert_eq!(&text[hits[0].start..hits[0].end], "Kowalskiego");
    }

    #[test]
    fn multiword_institution_matches() {
        let m = matcher(&[(EntryKind::Institution, "Urząd Skarbowy")]);
        let text = "pismo z Urząd Skarbowy w Radomiu";
        let hits = m.find(text);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn empty_lexicon_matches_nothing() {
        let m = matcher(&[]);
        assert!(m.find("Jan Kowalski").is_empty());
    }
}
