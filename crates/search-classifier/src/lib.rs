//! C2: regex/keyword query classification and engine routing.
//!
//! Grounded on `query_router.py`'s `PATTERNS`/`BOOSTERS`/`ENGINE_GROUPS`
//! tables, including the FANUC fault-code and industrial-vendor patterns
//! that the distilled spec only summarized.

mod tables;

use regex::Regex;
use search_core::{BackendId, Category, Query};
use std::collections::HashMap;

/// Result of classifying a query against a single category.
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub category: Category,
    pub engines: Vec<BackendId>,
    pub confidence: f64,
    pub matched_patterns: usize,
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub min_confidence: f64,
    pub max_engines: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            max_engines: 6,
        }
    }
}

struct CompiledCategory {
    patterns: Vec<Regex>,
    boosters: Vec<&'static str>,
    engines: Vec<BackendId>,
}

pub struct QueryClassifier {
    categories: HashMap<Category, CompiledCategory>,
    config: ClassifierConfig,
}

impl QueryClassifier {
    pub fn new() -> Self {
        Self::with_config(ClassifierConfig::default())
    }

    pub fn with_config(config: ClassifierConfig) -> Self {
        let mut categories = HashMap::new();
        for (category, patterns, boosters, engines) in tables::default_tables() {
            let compiled = patterns
                .iter()
                .map(|p| Regex::new(&format!("(?i){p}")).expect("built-in pattern is valid regex"))
                .collect();
            categories.insert(
                category,
                CompiledCategory {
                    patterns: compiled,
                    boosters,
                    engines: engines.into_iter().map(BackendId::new).collect(),
                },
            );
        }
        Self { categories, config }
    }

    /// Adds an extra pattern to `category`'s pattern set (e.g. a
    /// site-specific fault-code format), mirroring the original's
    /// `custom_patterns` constructor merge.
    pub fn add_pattern(&mut self, category: Category, pattern: &str) {
        let regex = Regex::new(&format!("(?i){pattern}")).expect("valid regex");
        self.categories
            .entry(category)
            .or_insert_with(|| CompiledCategory {
                patterns: Vec::new(),
                boosters: Vec::new(),
                engines: Vec::new(),
            })
            .patterns
            .push(regex);
    }

    fn score(&self, category: Category, text: &str) -> (f64, usize) {
        let Some(compiled) = self.categories.get(&category) else {
            return (0.0, 0);
        };
        if compiled.patterns.is_empty() {
            return (0.0, 0);
        }
        let matches = compiled.patterns.iter().filter(|r| r.is_match(text)).count();
        let boosters = compiled.boosters.iter().filter(|b| text.contains(*b)).count();
        let raw = matches as f64 / compiled.patterns.len() as f64 + 0.1 * boosters as f64;
        (raw.min(1.0), matches)
    }

    fn default_decision(&self) -> RoutingDecision {
        RoutingDecision {
            category: Category::General,
            engines: self
                .categories
                .get(&Category::General)
                .map(|c| c.engines.clone())
                .unwrap_or_default(),
            confidence: 0.5,
            matched_patterns: 0,
        }
    }

    /// Single best-matching category; ties break by [`Category`]'s fixed
    /// declaration order. Falls back to `General @ 0.5` confidence.
    pub fn route(&self, query: &Query) -> RoutingDecision {
        let mut best: Option<RoutingDecision> = None;
        for category in Category::ALL {
            let (confidence, matched) = self.score(category, &query.text);
            if confidence <= 0.0 {
                continue;
            }
            let better = match &best {
                None => true,
                Some(b) => confidence > b.confidence,
            };
            if better {
                best = Some(RoutingDecision {
                    category,
                    engines: self.categories[&category].engines.clone(),
                    confidence,
                    matched_patterns: matched,
                });
            }
        }
        best.unwrap_or_else(|| self.default_decision())
    }

    /// All categories scoring at or above `min_confidence`, sorted
    /// descending; falls back to `General @ 0.5` if none qualify.
    pub fn route_multi(&self, query: &Query) -> Vec<RoutingDecision> {
        let mut decisions: Vec<RoutingDecision> = Category::ALL
            .iter()
            .filter_map(|&category| {
                let (confidence, matched) = self.score(category, &query.text);
                if confidence >= self.config.min_confidence {
                    Some(RoutingDecision {
                        category,
                        engines: self.categories[&category].engines.clone(),
                        confidence,
                        matched_patterns: matched,
                    })
                } else {
                    None
                }
            })
            .collect();

        if decisions.is_empty() {
            decisions.push(self.default_decision());
        }

        decisions.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());
        decisions
    }

    /// Unions the engine lists of `route_multi`'s decisions, in
    /// confidence order, deduplicated, capped at `max_engines`.
    pub fn combined_engines(&self, query: &Query) -> Vec<BackendId> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for decision in self.route_multi(query) {
            for engine in decision.engines {
                if seen.insert(engine.clone()) {
                    out.push(engine);
                    if out.len() >= self.config.max_engines {
                        return out;
                    }
                }
            }
        }
        out
    }
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_academic_queries() {
        let classifier = QueryClassifier::new();
        let decision = classifier.route(&Query::new("find arxiv paper on transformers"));
        assert_eq!(decision.category, Category::Academic);
    }

    #[test]
    fn routes_fanuc_fault_codes_to_troubleshooting_or_industrial() {
        let classifier = QueryClassifier::new();
        let decision = classifier.route(&Query::new("SRVO-023 fault on robot"));
        assert!(matches!(
            decision.category,
            Category::Troubleshooting | Category::Industrial
        ));
    }

    #[test]
    fn unmatched_query_defaults_to_general() {
        let classifier = QueryClassifier::new();
        let decision = classifier.route(&Query::new("xyzzy plugh"));
        assert_eq!(decision.category, Category::General);
        assert_eq!(decision.confidence, 0.5);
    }

    #[test]
    fn route_multi_always_returns_at_least_one_decision() {
        let classifier = QueryClassifier::new();
        let decisions = classifier.route_multi(&Query::new("xyzzy plugh"));
        assert!(!decisions.is_empty());
    }

    #[test]
    fn combined_engines_is_capped() {
        let classifier = QueryClassifier::new();
        let engines = classifier.combined_engines(&Query::new(
            "arxiv paper python code error exception news today plc fanuc symptom",
        ));
        assert!(engines.len() <= ClassifierConfig::default().max_engines);
    }
}
