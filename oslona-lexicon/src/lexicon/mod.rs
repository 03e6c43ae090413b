use std::collections::HashMap;

/// The dictionary an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    FirstName,
    Surname,
    Locality,
    Institution,
    Occupation,
}

/// Confidence tier of the source list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Curated high-frequency list.
    Curated,
    /// Supplementary extension list.
    Extension,
}

/// A single dictionary entry, stored in base (lemma) form.
#[derive(Debug, Clone)]
pub struct LexiconEntry {
    pub lemma: String,
    pub kind: EntryKind,
    pub tier: Tier,
    /// Marks uniqueness amplifiers: small localities and rare occupations.
    pub quasi: bool,
}

/// An immutable, tiered dictionary of base forms keyed by lowercase lemma.
///
/// Built once at process start and shared read-only across record
/// processing tasks. The same lemma may carry several entries (e.g. a
/// word that is both a surname and an occupation).
#[derive(Debug)]
pub struct Lexicon {
    entries: Vec<LexiconEntry>,
    by_lemma: HashMap<String, Vec<u32>>,
    version: String,
}

/// Version tag of the embedded default lists.
pub const EMBEDDED_VERSION: &str = "builtin-2025.08";

impl Lexicon {
    /// Builds the lexicon from the embedded default lists.
    pub fn embedded() -> Self {
        let mut b = LexiconBuilder::new(EMBEDDED_VERSION);
        b.add_list(EntryKind::FirstName, Tier::Curated, false, include_str!("../../data/first_names.txt"));
        b.add_list(EntryKind::Surname, Tier::Curated, false, include_str!("../../data/surnames.txt"));
        b.add_list(EntryKind::Surname, Tier::Extension, false, include_str!("../../data/surnames_ext.txt"));
        b.add_list(EntryKind::Locality, Tier::Curated, false, include_str!("../../data/localities.txt"));
        b.add_list(EntryKind::Locality, Tier::Curated, true, include_str!("../../data/localities_small.txt"));
        b.add_list(EntryKind::Institution, Tier::Curated, false, include_str!("../../data/institutions.txt"));
        b.add_list(EntryKind::Occupation, Tier::Curated, true, include_str!("../../data/occupations_rare.txt"));
        b.build()
    }

    pub fn builder(version: impl Into<String>) -> LexiconBuilder {
        LexiconBuilder::new(version)
    }

    /// All entries registered under a lowercase lemma.
    pub fn lookup(&self, lemma_lower: &str) -> impl Iterator<Item = &LexiconEntry> {
        self.by_lemma
            .get(lemma_lower)
            .into_iter()
            .flatten()
            .map(move |&id| &self.entries[id as usize])
    }

    pub fn contains(&self, lemma_lower: &str) -> bool {
        self.by_lemma.contains_key(lemma_lower)
    }

    pub fn entries(&self) -> &[LexiconEntry] {
        &self.entries
    }

    pub fn entry(&self, id: u32) -> &LexiconEntry {
        &self.entries[id as usize]
    }

    pub fn entry_ids(&self, lemma_lower: &str) -> &[u32] {
        self.by_lemma.get(lemma_lower).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Incremental builder for a [`Lexicon`].
#[derive(Debug)]
pub struct LexiconBuilder {
    entries: Vec<LexiconEntry>,
    version: String,
}

impl LexiconBuilder {
    pub fn new(version: impl Into<String>) -> Self {
        Self { entries: Vec::new(), version: version.into() }
    }

    pub fn add(&mut self, kind: EntryKind, tier: Tier, quasi: bool, lemma: impl Into<String>) -> &mut Self {
        let lemma = lemma.into();
        if !lemma.is_empty() {
            self.entries.push(LexiconEntry { lemma, kind, tier, quasi });
        }
        self
    }

    /// Adds every non-comment line of a newline-separated word list.
    /// Lines starting with `#` and blank lines are skipped.
    pub fn add_list(&mut self, kind: EntryKind, tier: Tier, quasi: bool, src: &str) -> &mut Self {
        for line in src.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.add(kind, tier, quasi, line);
        }
        self
    }

    pub fn build(self) -> Lexicon {
        let mut by_lemma: HashMap<String, Vec<u32>> = HashMap::new();
        for (id, entry) in self.entries.iter().enumerate() {
            by_lemma.entry(entry.lemma.to_lowercase()).or_default().push(id as u32);
        }
        Lexicon { entries: self.entries, by_lemma, version: self.version }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_lists_load() {
        let lex = Lexicon::embedded();
        assert!(!lex.is_empty());
        assert!(lex.contains("kowalski"));
        assert!(lex.contains("warszawa"));
        assert!(lex.contains("ludwisarz"));
        assert_eq!(lex.version(), EMBEDDED_VERSION);
    }

    #[test]
    fn comment_and_blank_lines_are_skipped() {
        let mut b = LexiconBuilder::new("test");
        b.add_list(EntryKind::Surname, Tier::Curated, false, "# header\n\nNowak\n");
        let lex = b.build();
        assert_eq!(lex.len(), 1);
        assert!(lex.contains("nowak"));
    }

    #[test]
    fn lemma_can_carry_multiple_entries() {
        let mut b = LexiconBuilder::new("test");
        b.add(EntryKind::Surname, Tier::Extension, false, "Kołodziej");
        b.add(EntryKind::Occupation, Tier::Curated, true, "kołodziej");
        let lex = b.build();
        assert_eq!(lex.lookup("kołodziej").count(), 2);
    }

    #[test]
    fn small_locality_is_marked_quasi() {
        let lex = Lexicon::embedded();
        assert!(lex.lookup("wiżajny").any(|e| e.kind == EntryKind::Locality && e.quasi));
        assert!(lex.lookup("warszawa").all(|e| !e.quasi));
    }
}
