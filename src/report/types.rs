/// Message headings, taken from the `[notify]` config table.
#[derive(Debug, Clone)]
pub struct Layout {
    /// First line of every message
    pub title: String,
    /// Header of the newly opened PRs section
    pub new_header: String,
    /// Header of the updated PRs section
    pub updated_header: String,
    /// (label, header) pairs for label sections
    pub label_sections: Vec<(String, String)>,
}

/// A message being assembled: a title followed by section lines.
#[derive(Debug, Clone)]
pub struct Message {
    title: String,
    lines: Vec<String>,
}

impl Message {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            lines: Vec::new(),
        }
    }

    pub fn extend(&mut self, section: Vec<String>) {
        self.lines.extend(section);
    }

    /// True when no section contributed anything beyond the title.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_text(self) -> String {
        std::iter::once(self.title)
            .chain(self.lines)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
