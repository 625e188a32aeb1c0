//! Ordered selector fallback over a parsed document.
//!
//! Absence is a normal result here: every lookup returns `Option`/`Vec`, never an error.

use scraper::{ElementRef, Html};

use crate::models::{SelectorSource, SelectorSpec};

/// Stateless; one instance can serve every worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectorEngine;

impl SelectorEngine {
    pub fn new() -> Self {
        Self
    }

    /// First non-empty value, trying the chain's selectors in order.
    pub fn extract(&self, document: &Html, spec: &SelectorSpec) -> Option<String> {
        self.extract_in(document.root_element(), spec)
    }

    /// All values produced by the first selector in the chain that yields any.
    /// Selectors are alternatives, so later ones are not consulted once one matches.
    pub fn extract_all(&self, document: &Html, spec: &SelectorSpec) -> Vec<String> {
        self.extract_all_in(document.root_element(), spec)
    }

    /// `extract`, scoped to the subtree under `scope`.
    pub fn extract_in(&self, scope: ElementRef<'_>, spec: &SelectorSpec) -> Option<String> {
        spec.sources().iter().find_map(|source| {
            scope
                .select(source.selector())
                .find_map(|element| value_of(element, source))
        })
    }

    pub fn extract_all_in(&self, scope: ElementRef<'_>, spec: &SelectorSpec) -> Vec<String> {
        for source in spec.sources() {
            let values: Vec<String> = scope
                .select(source.selector())
                .filter_map(|element| value_of(element, source))
                .collect();
            if !values.is_empty() {
                return values;
            }
        }
        Vec::new()
    }

    /// Elements matched by the first selector in the chain that matches anything.
    pub fn select_first_matching<'a>(
        &self,
        document: &'a Html,
        spec: &SelectorSpec,
    ) -> Vec<ElementRef<'a>> {
        for source in spec.sources() {
            let elements: Vec<ElementRef<'a>> = document.select(source.selector()).collect();
            if !elements.is_empty() {
                return elements;
            }
        }
        Vec::new()
    }
}

fn value_of(element: ElementRef<'_>, source: &SelectorSource) -> Option<String> {
    let raw = match source.attribute() {
        Some(attr) => element.value().attr(attr)?.to_string(),
        None => element.text().collect::<String>(),
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
