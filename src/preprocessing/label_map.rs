//! Bidirectional label encoding

use crate::error::{AutotabError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Policy for values never seen during fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnseenPolicy {
    /// Map unseen values to the first assigned code (code 0)
    FallbackToFirst,
    /// Reject unseen values with a conversion error
    Reject,
}

/// Bidirectional string <-> integer code table
///
/// Codes are assigned in first-seen order and never change once assigned.
/// One type serves both roles: feature encoding (fallback policy) and
/// target label encoding/decoding (reject policy).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelMap {
    codes: HashMap<String, usize>,
    labels: Vec<String>,
    policy: UnseenPolicy,
}

impl LabelMap {
    pub fn new(policy: UnseenPolicy) -> Self {
        Self {
            codes: HashMap::new(),
            labels: Vec::new(),
            policy,
        }
    }

    /// Build a map from values in first-seen order
    pub fn fit<'a, I>(values: I, policy: UnseenPolicy) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut map = Self::new(policy);
        for value in values {
            map.insert(value);
        }
        map
    }

    /// Return the code for `value`, assigning the next code if unseen.
    /// Only valid during fit; inference goes through [`encode`](Self::encode).
    pub fn insert(&mut self, value: &str) -> usize {
        if let Some(&code) = self.codes.get(value) {
            return code;
        }
        let code = self.labels.len();
        self.codes.insert(value.to_string(), code);
        self.labels.push(value.to_string());
        code
    }

    /// Encode without mutating; unseen values resolve per policy
    pub fn encode(&self, value: &str) -> Result<usize> {
        if let Some(&code) = self.codes.get(value) {
            return Ok(code);
        }
        match self.policy {
            UnseenPolicy::FallbackToFirst if !self.labels.is_empty() => Ok(0),
            UnseenPolicy::FallbackToFirst => Err(AutotabError::ConversionError(
                "label map is empty, no fallback code exists".to_string(),
            )),
            UnseenPolicy::Reject => Err(AutotabError::ConversionError(format!(
                "unseen label '{}'",
                value
            ))),
        }
    }

    /// Decode a code back to its original label
    pub fn decode(&self, code: usize) -> Result<&str> {
        self.labels
            .get(code)
            .map(|s| s.as_str())
            .ok_or_else(|| {
                AutotabError::ConversionError(format!(
                    "label code {} out of range (0..{})",
                    code,
                    self.labels.len()
                ))
            })
    }

    pub fn code_of(&self, value: &str) -> Option<usize> {
        self.codes.get(value).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels in code order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_seen_order() {
        let map = LabelMap::fit(["b", "a", "b", "c"], UnseenPolicy::FallbackToFirst);
        assert_eq!(map.code_of("b"), Some(0));
        assert_eq!(map.code_of("a"), Some(1));
        assert_eq!(map.code_of("c"), Some(2));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_codes_unique_and_stable() {
        let mut map = LabelMap::new(UnseenPolicy::FallbackToFirst);
        let first = map.insert("x");
        let second = map.insert("y");
        assert_ne!(first, second);
        // Repeated inserts keep the original code
        assert_eq!(map.insert("x"), first);
        assert_eq!(map.encode("x").unwrap(), first);
    }

    #[test]
    fn test_unseen_fallback_never_errors() {
        let map = LabelMap::fit(["yes", "no"], UnseenPolicy::FallbackToFirst);
        assert_eq!(map.encode("maybe").unwrap(), 0);
    }

    #[test]
    fn test_unseen_reject() {
        let map = LabelMap::fit(["yes", "no"], UnseenPolicy::Reject);
        assert!(matches!(
            map.encode("maybe"),
            Err(AutotabError::ConversionError(_))
        ));
    }

    #[test]
    fn test_decode_round_trip() {
        let map = LabelMap::fit(["yes", "no"], UnseenPolicy::Reject);
        for label in ["yes", "no"] {
            let code = map.encode(label).unwrap();
            assert_eq!(map.decode(code).unwrap(), label);
        }
        assert!(map.decode(5).is_err());
    }
}
