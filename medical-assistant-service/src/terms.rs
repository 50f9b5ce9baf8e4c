use std::collections::HashSet;

/// Case-insensitive gate for the first consultation stage.
#[derive(Debug, Clone)]
pub struct TermValidator {
    terms: HashSet<String>,
}

impl TermValidator {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .map(|t| normalize(t.as_ref()))
            .filter(|t| !t.is_empty())
            .collect();
        Self { terms }
    }

    /// Exact match after trimming and lowercasing. No partial matches.
    pub fn is_valid(&self, input: &str) -> bool {
        self.terms.contains(&normalize(input))
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

pub fn normalize(input: &str) -> String {
    input.trim().to_lowercase()
}
