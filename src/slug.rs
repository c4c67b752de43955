//! Slug generation for every URL the site emits.
//!
//! All entity kinds (salons, cities, states, categories) share the same
//! slug rule so that a slug arriving pre-set from the data tables and one
//! derived from a display name look alike:
//!
//! - `"Jane's Nails & Spa!"` → `"janes-nails-spa"`
//! - `"  San   Antonio "` → `"san-antonio"`
//! - `"new--york-"` → `"new-york"`
//!
//! ## Idempotence
//!
//! `slugify(slugify(x)) == slugify(x)` for every input. The graph builder
//! relies on this when it re-cleans slugs that came from the source tables:
//! a slug that is already clean passes through unchanged.
//!
//! ## Uniqueness
//!
//! [`SlugRegistry`] hands out unique slugs within one entity kind. The first
//! claimant keeps the bare slug, later ones get `-2`, `-3`, … appended.

use std::collections::HashSet;

/// Turn free text into a lowercase, hyphen-delimited, URL-safe slug.
///
/// Keeps ASCII letters, digits and `-`. Whitespace runs become a single
/// hyphen, repeated hyphens collapse, and leading/trailing hyphens are
/// trimmed. Empty input yields the empty string; callers treat that as a
/// missing slug.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_whitespace() || c == '-' {
            pending_hyphen = true;
        } else if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        }
        // Anything else is dropped without breaking the current word:
        // "Jane's" → "janes".
    }

    slug
}

/// Hands out slugs that are unique within one entity kind.
#[derive(Debug, Default)]
pub struct SlugRegistry {
    taken: HashSet<String>,
}

impl SlugRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `slug`, or the first free `slug-N` (N starting at 2).
    pub fn claim(&mut self, slug: &str) -> String {
        if self.taken.insert(slug.to_string()) {
            return slug.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{slug}-{n}");
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }

    #[cfg(test)]
    pub fn is_taken(&self, slug: &str) -> bool {
        self.taken.contains(slug)
    }
}
