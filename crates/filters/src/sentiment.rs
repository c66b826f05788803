//! Rating coercion and rule-based sentiment labeling
//!
//! A raw rating is coerced to a number (or marked invalid/missing) and then
//! looked up in an ordered table of `(interval, label)` rules. The first
//! matching rule wins; anything unmatched is `unknown`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentiment label. Always one of the four variants, never absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
    Unknown,
}

impl Sentiment {
    pub const ALL: [Sentiment; 4] = [
        Sentiment::Negative,
        Sentiment::Neutral,
        Sentiment::Positive,
        Sentiment::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
            Sentiment::Positive => "positive",
            Sentiment::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rating after coercion
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rating {
    Numeric(f64),
    /// Present but not a finite number, e.g. `"|"` or `"4.|"`
    Invalid,
    /// Null or blank
    Missing,
}

impl Rating {
    /// Coerce a raw cell. Surrounding whitespace is ignored; anything else that
    /// does not parse completely as a finite number is invalid.
    pub fn parse(raw: Option<&str>) -> Self {
        let trimmed = match raw.map(str::trim) {
            None | Some("") => return Rating::Missing,
            Some(t) => t,
        };

        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Rating::Numeric(value),
            _ => Rating::Invalid,
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Rating::Numeric(v) => Some(*v),
            _ => None,
        }
    }
}

/// One row of the sentiment table: `[min, max)` or `[min, max]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentRule {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub max_inclusive: bool,
    pub label: Sentiment,
}

impl SentimentRule {
    pub fn half_open(min: f64, max: f64, label: Sentiment) -> Self {
        Self {
            min,
            max,
            max_inclusive: false,
            label,
        }
    }

    pub fn closed(min: f64, max: f64, label: Sentiment) -> Self {
        Self {
            min,
            max,
            max_inclusive: true,
            label,
        }
    }

    pub fn matches(&self, value: f64) -> bool {
        value >= self.min
            && if self.max_inclusive {
                value <= self.max
            } else {
                value < self.max
            }
    }
}

/// Ordered rule table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SentimentRules {
    rules: Vec<SentimentRule>,
}

impl Default for SentimentRules {
    /// [1, 3) negative, [3, 4) neutral, [4, 5] positive
    fn default() -> Self {
        Self {
            rules: vec![
                SentimentRule::half_open(1.0, 3.0, Sentiment::Negative),
                SentimentRule::half_open(3.0, 4.0, Sentiment::Neutral),
                SentimentRule::closed(4.0, 5.0, Sentiment::Positive),
            ],
        }
    }
}

impl SentimentRules {
    /// Build a validated table. Bounds must be finite and `min <= max`.
    pub fn new(rules: Vec<SentimentRule>) -> Result<Self> {
        let table = Self { rules };
        table.validate()?;
        Ok(table)
    }

    /// Check a table that may have come from deserialization
    pub fn validate(&self) -> Result<()> {
        if self.rules.is_empty() {
            return Err(Error::InvalidConfig(
                "Sentiment rule table is empty".to_string(),
            ));
        }
        for (idx, rule) in self.rules.iter().enumerate() {
            if !rule.min.is_finite() || !rule.max.is_finite() {
                return Err(Error::InvalidRule(format!(
                    "rule {} has a non-finite bound",
                    idx
                )));
            }
            if rule.min > rule.max {
                return Err(Error::InvalidRule(format!(
                    "rule {} has min {} > max {}",
                    idx, rule.min, rule.max
                )));
            }
        }
        Ok(())
    }

    pub fn rules(&self) -> &[SentimentRule] {
        &self.rules
    }

    /// Label a coerced rating. Total: every input yields a label.
    pub fn classify(&self, rating: Rating) -> Sentiment {
        match rating {
            Rating::Numeric(value) => self
                .rules
                .iter()
                .find(|rule| rule.matches(value))
                .map(|rule| rule.label)
                .unwrap_or(Sentiment::Unknown),
            Rating::Invalid | Rating::Missing => Sentiment::Unknown,
        }
    }

    /// Coerce and label a raw rating in one step
    pub fn annotate(&self, raw: Option<&str>) -> (Rating, Sentiment) {
        let rating = Rating::parse(raw);
        (rating, self.classify(rating))
    }
}
