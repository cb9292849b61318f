//! Ordered precedence of name-like entity fields.

/// A name-like field stored on an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayField {
    Name,
    Title,
    Label,
    CanonicalTitle,
}

impl DisplayField {
    /// Column holding this field in the `entities` table.
    pub fn column(self) -> &'static str {
        match self {
            DisplayField::Name => "name",
            DisplayField::Title => "title",
            DisplayField::Label => "label",
            DisplayField::CanonicalTitle => "canonical_title",
        }
    }

    fn read(self, names: &EntityNames) -> Option<&str> {
        match self {
            DisplayField::Name => names.name.as_deref(),
            DisplayField::Title => names.title.as_deref(),
            DisplayField::Label => names.label.as_deref(),
            DisplayField::CanonicalTitle => names.canonical_title.as_deref(),
        }
    }
}

/// Raw name-like fields of one entity row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityNames {
    pub name: Option<String>,
    pub title: Option<String>,
    pub label: Option<String>,
    pub canonical_title: Option<String>,
}

/// Picks an entity's display name: the first non-empty field in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayNamePolicy {
    fields: Vec<DisplayField>,
}

impl Default for DisplayNamePolicy {
    fn default() -> Self {
        Self::new(vec![
            DisplayField::Name,
            DisplayField::Title,
            DisplayField::Label,
            DisplayField::CanonicalTitle,
        ])
    }
}

impl DisplayNamePolicy {
    pub fn new(fields: Vec<DisplayField>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[DisplayField] {
        &self.fields
    }

    pub fn pick<'a>(&self, names: &'a EntityNames) -> Option<&'a str> {
        self.fields
            .iter()
            .filter_map(|f| f.read(names))
            .find(|s| !s.is_empty())
    }

    /// SQL expression with the same precedence, for use in `SELECT`/`WHERE`.
    pub fn sql_expr(&self) -> String {
        if self.fields.is_empty() {
            return "NULL".to_string();
        }
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|f| format!("NULLIF({}, '')", f.column()))
            .collect();
        format!("COALESCE({})", parts.join(", "))
    }
}
