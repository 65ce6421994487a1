//! Context categories and their ranking weights.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of a captured context document.
///
/// Categories bias ranking through [`Category::weight`]; they never filter
/// results unless a caller explicitly restricts the category set. Tags that
/// do not name a known category are kept verbatim in [`Category::Other`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Html,
    Css,
    JavaScript,
    Network,
    Console,
    Performance,
    Accessibility,
    Security,
    #[default]
    General,
    Other(String),
}

impl Category {
    /// The known categories, in declaration order.
    pub const KNOWN: [Category; 9] = [
        Category::Html,
        Category::Css,
        Category::JavaScript,
        Category::Network,
        Category::Console,
        Category::Performance,
        Category::Accessibility,
        Category::Security,
        Category::General,
    ];

    /// Order in which categories are laid out when assembling context for a prompt.
    /// Error-bearing categories come first.
    pub const ERROR_PRIORITY: [Category; 8] = [
        Category::Console,
        Category::JavaScript,
        Category::Performance,
        Category::Security,
        Category::Html,
        Category::Css,
        Category::Network,
        Category::Accessibility,
    ];

    /// Parse a free-form tag. Matching is case-insensitive and accepts the
    /// tags emitted by the page scrapers (`network_request`, `dom`, `log`, ...).
    pub fn parse(tag: &str) -> Self {
        let normalized = tag.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "HTML" | "DOM" | "DOM_MUTATION" => Self::Html,
            "CSS" | "STYLE" | "STYLES" => Self::Css,
            "JAVASCRIPT" | "JS" | "SCRIPT" => Self::JavaScript,
            "NETWORK" | "NETWORK_REQUEST" | "NETWORK_RESPONSE" | "XHR" | "FETCH" => Self::Network,
            "CONSOLE" | "LOG" | "CONSOLE_LOG" => Self::Console,
            "PERFORMANCE" | "PERF" => Self::Performance,
            "ACCESSIBILITY" | "A11Y" => Self::Accessibility,
            "SECURITY" => Self::Security,
            "" | "GENERAL" => Self::General,
            _ => Self::Other(tag.trim().to_string()),
        }
    }

    /// Ranking weight in `(0, 1]`.
    pub fn weight(&self) -> f32 {
        match self {
            Self::JavaScript => 0.9,
            Self::Html | Self::Console | Self::Security => 0.8,
            Self::Css | Self::Performance => 0.7,
            Self::Network | Self::Accessibility => 0.6,
            Self::General | Self::Other(_) => 0.5,
        }
    }

    /// Canonical upper-case label.
    pub fn label(&self) -> &str {
        match self {
            Self::Html => "HTML",
            Self::Css => "CSS",
            Self::JavaScript => "JAVASCRIPT",
            Self::Network => "NETWORK",
            Self::Console => "CONSOLE",
            Self::Performance => "PERFORMANCE",
            Self::Accessibility => "ACCESSIBILITY",
            Self::Security => "SECURITY",
            Self::General => "GENERAL",
            Self::Other(tag) => tag.as_str(),
        }
    }

    /// Display icon used in prompt summaries.
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Html => "🏗️",
            Self::Css => "🎨",
            Self::JavaScript => "⚡",
            Self::Network => "🌐",
            Self::Console => "🐛",
            Self::Performance => "📊",
            Self::Accessibility => "♿",
            Self::Security => "🔒",
            Self::General | Self::Other(_) => "📄",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Category {
    fn from(tag: String) -> Self {
        Self::parse(&tag)
    }
}

impl From<&str> for Category {
    fn from(tag: &str) -> Self {
        Self::parse(tag)
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.label().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scraper_tags() {
        assert_eq!(Category::parse("CONSOLE"), Category::Console);
        assert_eq!(Category::parse("console"), Category::Console);
        assert_eq!(Category::parse("network_request"), Category::Network);
        assert_eq!(Category::parse("HTML"), Category::Html);
        assert_eq!(Category::parse(""), Category::General);
        assert_eq!(Category::parse("web-vitals"), Category::Other("web-vitals".into()));
    }

    #[test]
    fn weights_are_in_unit_interval() {
        let mut all = Category::KNOWN.to_vec();
        all.push(Category::Other("x".into()));
        for category in &all {
            let w = category.weight();
            assert!(w > 0.0 && w <= 1.0, "{category} has weight {w}");
        }
        assert!(Category::JavaScript.weight() > Category::Network.weight());
    }

    #[test]
    fn serializes_as_label() {
        let json = serde_json::to_string(&Category::JavaScript).unwrap();
        assert_eq!(json, "\"JAVASCRIPT\"");
        let back: Category = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Category::JavaScript);
        let other: Category = serde_json::from_str("\"custom\"").unwrap();
        assert_eq!(other.label(), "custom");
    }
}
