use serde::{Deserialize, Serialize};

/// One work as listed in the bulk catalog.
///
/// `collection_id` + `nominal_file_id` are the catalog's best guess at where the text
/// lives; they are not guaranteed to name a real resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub work_id: String,
    pub title: String,
    pub author_surname: String,
    pub author_given_name: String,
    pub opening_line: String,
    pub collection_id: String,
    pub nominal_file_id: String,
}

impl CatalogRecord {
    pub fn author(&self) -> String {
        format!("{}{}", self.author_surname, self.author_given_name)
    }

    pub fn matches(&self, query: &str, field: SearchField) -> bool {
        match field {
            SearchField::Title => self.title.contains(query),
            SearchField::Author => self.author_matches(query),
            SearchField::All => self.title.contains(query) || self.author_matches(query),
        }
    }

    fn author_matches(&self, query: &str) -> bool {
        self.author_surname.contains(query)
            || (!self.author_given_name.is_empty() && self.author_given_name.contains(query))
            || self.author().contains(query)
            || format!("{} {}", self.author_surname, self.author_given_name).contains(query)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    Title,
    Author,
    #[default]
    All,
}

impl SearchField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchField::Title => "title",
            SearchField::Author => "author",
            SearchField::All => "all",
        }
    }
}

impl std::fmt::Display for SearchField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SearchField {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "title" => Ok(SearchField::Title),
            "author" => Ok(SearchField::Author),
            "all" => Ok(SearchField::All),
            _ => Err("unknown search field"),
        }
    }
}
