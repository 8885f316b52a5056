use crate::model::SectionId;

/// A catalog entry for a content section that gates quiz access.
///
/// Sections are static data: they are defined once at registry construction
/// and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    id: SectionId,
    title: String,
    required: bool,
}

impl Section {
    #[must_use]
    pub fn new(id: SectionId, title: impl Into<String>, required: bool) -> Self {
        Self {
            id,
            title: title.into(),
            required,
        }
    }

    #[must_use]
    pub fn id(&self) -> &SectionId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn required(&self) -> bool {
        self.required
    }
}

/// Ordered, immutable catalog of the course's content sections.
///
/// The registry is built once per app context and injected into the services
/// that need it, so tests can instantiate isolated catalogs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionRegistry {
    sections: Vec<Section>,
}

impl SectionRegistry {
    #[must_use]
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Look up a section by its stable id.
    #[must_use]
    pub fn find(&self, id: &SectionId) -> Option<&Section> {
        self.sections.iter().find(|s| s.id() == id)
    }

    /// All required sections in registry order.
    pub fn all_required(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(|s| s.required())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// A registry section merged with the user's completion state.
///
/// This is the view the progress store hands to its subscribers: the static
/// catalog entry plus the per-user `completed` flag and accumulated reading
/// time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingSection {
    section: Section,
    completed: bool,
    reading_time_seconds: u32,
}

impl ReadingSection {
    /// A registry entry with no recorded progress.
    #[must_use]
    pub fn incomplete(section: Section) -> Self {
        Self {
            section,
            completed: false,
            reading_time_seconds: 0,
        }
    }

    #[must_use]
    pub fn section(&self) -> &Section {
        &self.section
    }

    #[must_use]
    pub fn completed(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn reading_time_seconds(&self) -> u32 {
        self.reading_time_seconds
    }

    /// Mark the section read. Re-completion overwrites the reading time, it
    /// does not accumulate.
    pub fn mark_completed(&mut self, reading_time_seconds: u32) {
        self.completed = true;
        self.reading_time_seconds = reading_time_seconds;
    }

    /// Drop back to the no-progress state (after a full reset).
    pub fn clear(&mut self) {
        self.completed = false;
        self.reading_time_seconds = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SectionRegistry {
        SectionRegistry::new(vec![
            Section::new(SectionId::new("intro").unwrap(), "Introduction", true),
            Section::new(SectionId::new("dialectic").unwrap(), "Dialectic", true),
            Section::new(SectionId::new("appendix").unwrap(), "Appendix", false),
        ])
    }

    #[test]
    fn find_returns_catalog_entry() {
        let registry = registry();
        let id = SectionId::new("dialectic").unwrap();
        let section = registry.find(&id).unwrap();
        assert_eq!(section.title(), "Dialectic");
        assert!(section.required());

        let missing = SectionId::new("nope").unwrap();
        assert!(registry.find(&missing).is_none());
    }

    #[test]
    fn all_required_skips_optional_sections() {
        let registry = registry();
        let required: Vec<_> = registry.all_required().map(|s| s.id().as_str()).collect();
        assert_eq!(required, ["intro", "dialectic"]);
    }

    #[test]
    fn recompletion_overwrites_reading_time() {
        let registry = registry();
        let mut reading = ReadingSection::incomplete(registry.sections()[0].clone());
        reading.mark_completed(42);
        reading.mark_completed(7);
        assert!(reading.completed());
        assert_eq!(reading.reading_time_seconds(), 7);
    }
}
