//! Prompt-ready context summaries, pattern analysis and statistics.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::document::{ContextDocument, SearchResult};
use crate::retrieval::SearchOptions;

const HOUR: Duration = Duration::from_secs(3600);
const DAY: Duration = Duration::from_secs(24 * 3600);
const WEEK: Duration = Duration::from_secs(7 * 24 * 3600);

const ENTRIES_PER_CATEGORY: usize = 3;
const EXCERPT_CHARS: usize = 200;
const TRUNCATION_MARKER: &str = "- [Additional context truncated]\n";

/// Returned by [`summarize`] when nothing matched.
pub const NO_CONTEXT: &str = "No relevant context found for this query.";

/// Substrings counted by [`analyze_patterns`].
pub const ISSUE_KEYWORDS: [&str; 7] =
    ["error", "warning", "failed", "missing", "undefined", "null", "exception"];

/// Options for [`ContextEngine::context_summary`](crate::ContextEngine::context_summary).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SummaryOptions {
    /// Budget, in characters, for the summary entries.
    pub max_context_length: usize,
    /// Categories searched.
    pub categories: Vec<Category>,
    /// Lay out error-bearing categories first instead of in `categories` order.
    pub prioritize_errors: bool,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            max_context_length: 4000,
            categories: vec![
                Category::JavaScript,
                Category::Html,
                Category::Console,
                Category::Performance,
            ],
            prioritize_errors: true,
        }
    }
}

impl SummaryOptions {
    /// The search run to gather summary material.
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions::default()
            .with_categories(self.categories.iter().cloned())
            .max_results(20)
            .min_relevance(0.3)
    }

    fn category_order(&self) -> Vec<Category> {
        if self.prioritize_errors {
            Category::ERROR_PRIORITY.to_vec()
        } else {
            self.categories.clone()
        }
    }
}

/// Render ranked results as a compact, category-grouped text block for an
/// LLM prompt.
///
/// Categories are laid out in priority order with at most three entries each;
/// categories outside the priority order follow in first-seen order. Each
/// entry is an excerpt of at most 200 characters. Once the character budget
/// would be exceeded a truncation marker is written.
pub fn summarize(results: &[SearchResult], options: &SummaryOptions) -> String {
    if results.is_empty() {
        return NO_CONTEXT.to_string();
    }

    let mut groups: Vec<(&Category, Vec<&SearchResult>)> = Vec::new();
    for result in results {
        let category = &result.document.category;
        match groups.iter_mut().find(|(c, _)| *c == category) {
            Some((_, members)) => members.push(result),
            None => groups.push((category, vec![result])),
        }
    }

    let mut order = options.category_order();
    for (category, _) in &groups {
        if !order.contains(category) {
            order.push((*category).clone());
        }
    }

    let mut summary = String::new();
    let mut length = 0;
    for category in &order {
        let Some((_, members)) = groups.iter().find(|(c, _)| *c == category) else {
            continue;
        };
        summary.push_str(&format!("\n{} {}:\n", category.icon(), category.label()));

        for result in members.iter().take(ENTRIES_PER_CATEGORY) {
            let excerpt: String = result.document.content.chars().take(EXCERPT_CHARS).collect();
            let entry = format!("- {excerpt}...\n");
            let entry_len = entry.chars().count();
            if length + entry_len > options.max_context_length {
                summary.push_str(TRUNCATION_MARKER);
                break;
            }
            summary.push_str(&entry);
            length += entry_len;
        }

        if length >= options.max_context_length {
            break;
        }
    }

    summary.trim().to_string()
}

/// Document counts over trailing time windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityWindows {
    pub last_hour: usize,
    pub last_day: usize,
    pub last_week: usize,
}

/// What [`analyze_patterns`] found in stored context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternReport {
    /// Documents per category label.
    pub category_distribution: BTreeMap<String, usize>,
    /// Documents mentioning each issue keyword. Keywords with no hits are absent.
    pub common_issues: BTreeMap<String, usize>,
    pub activity: ActivityWindows,
    pub recommendations: Vec<String>,
}

fn count_by_category(documents: &[ContextDocument]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for doc in documents {
        *counts.entry(doc.category.label().to_string()).or_insert(0) += 1;
    }
    counts
}

fn newer_than(documents: &[ContextDocument], now: DateTime<Utc>, window: Duration) -> usize {
    documents.iter().filter(|doc| doc.age(now) < window).count()
}

/// Summarize category mix, recurring issue keywords and recent activity.
pub fn analyze_patterns(documents: &[ContextDocument], now: DateTime<Utc>) -> PatternReport {
    let category_distribution = count_by_category(documents);

    let mut common_issues = BTreeMap::new();
    for doc in documents {
        let content = doc.content.to_lowercase();
        for keyword in ISSUE_KEYWORDS {
            if content.contains(keyword) {
                *common_issues.entry(keyword.to_string()).or_insert(0) += 1;
            }
        }
    }

    let activity = ActivityWindows {
        last_hour: newer_than(documents, now, HOUR),
        last_day: newer_than(documents, now, DAY),
        last_week: newer_than(documents, now, WEEK),
    };

    let mut recommendations = Vec::new();
    if common_issues.get("error").is_some_and(|n| *n > 5) {
        recommendations.push("High number of errors detected - consider debugging".to_string());
    }
    if category_distribution.get(Category::Performance.label()).is_some_and(|n| *n > 10) {
        recommendations.push("Performance issues detected frequently".to_string());
    }
    if activity.last_hour > 20 {
        recommendations
            .push("High activity in last hour - may indicate active debugging".to_string());
    }

    PatternReport { category_distribution, common_issues, activity, recommendations }
}

/// Aggregate figures over stored context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextStatistics {
    pub total_documents: usize,
    pub bookmarked: usize,
    pub last_hour: usize,
    pub last_day: usize,
    /// Mean relevance score, 0 when empty.
    pub average_relevance: f32,
    pub by_category: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest: Option<DateTime<Utc>>,
}

pub fn statistics(documents: &[ContextDocument], now: DateTime<Utc>) -> ContextStatistics {
    let average_relevance = if documents.is_empty() {
        0.0
    } else {
        documents.iter().map(|d| d.relevance_score).sum::<f32>() / documents.len() as f32
    };
    ContextStatistics {
        total_documents: documents.len(),
        bookmarked: documents.iter().filter(|d| d.bookmarked).count(),
        last_hour: newer_than(documents, now, HOUR),
        last_day: newer_than(documents, now, DAY),
        average_relevance,
        by_category: count_by_category(documents),
        oldest: documents.iter().map(|d| d.timestamp).min(),
        newest: documents.iter().map(|d| d.timestamp).max(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, category: Category, content: &str, hours_old: i64) -> ContextDocument {
        ContextDocument {
            id: id.into(),
            parent_id: id.into(),
            content: content.into(),
            kind: category.label().to_string(),
            category,
            url: String::new(),
            title: String::new(),
            timestamp: Utc::now() - chrono::Duration::hours(hours_old),
            chunk_index: 0,
            total_chunks: 1,
            relevance_score: 0.5,
            bookmarked: false,
        }
    }

    fn hit(document: ContextDocument) -> SearchResult {
        SearchResult { document, similarity: 0.9, score: 0.9 }
    }

    #[test]
    fn empty_results_say_so() {
        assert_eq!(summarize(&[], &SummaryOptions::default()), NO_CONTEXT);
    }

    #[test]
    fn errors_are_laid_out_first() {
        let results = vec![
            hit(doc("h", Category::Html, "<div id=app>", 0)),
            hit(doc("c", Category::Console, "TypeError: x is undefined", 0)),
        ];
        let summary = summarize(&results, &SummaryOptions::default());
        let console = summary.find("CONSOLE:").unwrap();
        let html = summary.find("HTML:").unwrap();
        assert!(console < html);
        assert!(summary.contains("- TypeError: x is undefined..."));
    }

    #[test]
    fn entries_are_capped_and_truncated() {
        let long = "x".repeat(500);
        let results: Vec<_> =
            (0..5).map(|i| hit(doc(&format!("c{i}"), Category::Console, &long, 0))).collect();

        let summary = summarize(&results, &SummaryOptions::default());
        assert_eq!(summary.matches("- x").count(), ENTRIES_PER_CATEGORY);
        assert!(summary.contains(&format!("- {}...", "x".repeat(EXCERPT_CHARS))));

        let tight = SummaryOptions { max_context_length: 300, ..SummaryOptions::default() };
        let summary = summarize(&results, &tight);
        assert_eq!(summary.matches("- x").count(), 1);
        assert!(summary.ends_with("- [Additional context truncated]"));
    }

    #[test]
    fn patterns_count_keywords_and_activity() {
        let mut docs: Vec<_> = (0..6)
            .map(|i| doc(&format!("e{i}"), Category::Console, "Uncaught Error: failed", 0))
            .collect();
        docs.push(doc("old", Category::Network, "GET /api 200", 48));

        let report = analyze_patterns(&docs, Utc::now());
        assert_eq!(report.common_issues.get("error"), Some(&6));
        assert_eq!(report.common_issues.get("failed"), Some(&6));
        assert!(!report.common_issues.contains_key("null"));
        assert_eq!(report.activity, ActivityWindows { last_hour: 6, last_day: 6, last_week: 7 });
        assert_eq!(report.category_distribution.get("CONSOLE"), Some(&6));
        assert_eq!(report.recommendations.len(), 1);
    }

    #[test]
    fn statistics_aggregate_documents() {
        let mut pinned = doc("p", Category::Css, "a", 30);
        pinned.bookmarked = true;
        pinned.relevance_score = 1.0;
        let docs = vec![pinned, doc("n", Category::Css, "b", 0)];

        let stats = statistics(&docs, Utc::now());
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.bookmarked, 1);
        assert_eq!(stats.last_day, 1);
        assert!((stats.average_relevance - 0.75).abs() < 1e-6);
        assert_eq!(stats.by_category.get("CSS"), Some(&2));
        assert!(stats.oldest < stats.newest);

        assert_eq!(statistics(&[], Utc::now()).average_relevance, 0.0);
    }
}
