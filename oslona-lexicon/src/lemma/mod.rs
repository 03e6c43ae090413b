/// Suffix-based candidate lemmatization for inflected Polish tokens.
///
/// Polish nouns and proper names inflect through seven cases; full
/// morphological analysis is out of scope, so this module generates a
/// small set of plausible base forms by rewriting common case endings.
/// Callers check each candidate against the lexicon, so over-generation
/// is harmless.

/// Case-ending rewrites, tried longest suffix first. Each matching
/// suffix yields one candidate per replacement.
const SUFFIX_RULES: &[(&str, &[&str])] = &[
    ("owie", &[""]),
    ("iego", &["i"]),
    ("iemu", &["i"]),
    ("skim", &["ski"]),
    ("skiej", &["ska"]),
    ("iej", &["a"]),
    ("iem", &[""]),
    ("owi", &[""]),
    ("ami", &["a", ""]),
    ("ach", &["a", ""]),
    ("im", &["i"]),
    ("ym", &["y"]),
    ("em", &[""]),
    ("iu", &[""]),
    ("ie", &["a", ""]),
    ("ę", &["a"]),
    ("ą", &["a"]),
    ("u", &[""]),
    ("y", &["a"]),
    ("i", &["a"]),
    ("a", &[""]),
];

/// Minimum stem length (in chars) left after stripping a suffix.
const MIN_STEM_CHARS: usize = 3;

/// Generates candidate base forms for a lowercase token. The token
/// itself is not included. Candidates are deduplicated, ordered by
/// rule priority.
pub fn candidates(token_lower: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for (suffix, replacements) in SUFFIX_RULES {
        if let Some(stem) = token_lower.strip_suffix(suffix) {
            if stem.chars().count() < MIN_STEM_CHARS {
                continue;
            }
            for repl in *replacements {
                push_unique(&mut out, format!("{stem}{repl}"));
                // Vowel alternation: closed final syllables often restore
                // o -> ó in the nominative (Krakowie -> Kraków).
                if let Some(restored) = restore_o_kreska(stem, repl) {
                    push_unique(&mut out, restored);
                }
            }
        }
    }
    out
}

fn push_unique(out: &mut Vec<String>, candidate: String) {
    if !out.iter().any(|c| *c == candidate) {
        out.push(candidate);
    }
}

fn restore_o_kreska(stem: &str, repl: &str) -> Option<String> {
    if !repl.is_empty() {
        return None;
    }
    let idx = stem.rfind('o')?;
    // Only restore when the o sits in the final syllable.
    if stem[idx + 1..].contains(|c: char| "aeiouyąęó".contains(c)) {
        return None;
    }
    let mut restored = String::with_capacity(stem.len() + 1);
    restored.push_str(&stem[..idx]);
    restored.push('ó');
    restored.push_str(&stem[idx + 1..]);
    Some(restored)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has(token: &str, lemma: &str) -> bool {
        candidates(token).iter().any(|c| c == lemma)
    }

    #[test]
    fn surname_genitive_resolves() {
        assert!(has("kowalskiego", "kowalski"));
        assert!(has("nowaka", "nowak"));
    }

    #[test]
    fn surname_dative_and_instrumental_resolve() {
        assert!(has("nowakowi", "nowak"));
        assert!(has("nowakiem", "nowak"));
        assert!(has("kowalskim", "kowalski"));
    }

    #[test]
    fn feminine_forms_resolve() {
        assert!(has("anny", "anna"));
        assert!(has("annę", "anna"));
        assert!(has("zielińskiej", "zielińska"));
    }

    #[test]
    fn locality_locative_resolves() {
        assert!(has("warszawie", "warszawa"));
        assert!(has("gdańsku", "gdańsk"));
        assert!(has("radomiu", "radom"));
        // o -> ó restoration in the final syllable
        assert!(has("krakowie", "kraków"));
    }

    #[test]
    fn short_stems_are_not_generated() {
        assert!(!candidates("ona").iter().any(|c| c == "on"));
    }
}
