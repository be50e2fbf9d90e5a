use regex::Regex;

use crate::labels::LogLabels;

/// Comparison operator of a label matcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchOp {
    /// `=`
    Eq,
    /// `!=`
    Neq,
    /// `=~`
    Re,
    /// `!~`
    Nre,
}

/// A single label matcher, e.g. `app=~"api|web"`.
///
/// Regex matchers are anchored at construction (`^(?:pattern)$`) so a
/// pattern must match the whole label value.
#[derive(Clone, Debug)]
pub struct LabelMatcher {
    name: String,
    op: MatchOp,
    value: String,
    regex: Option<Regex>,
}

impl PartialEq for LabelMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.op == other.op && self.value == other.value
    }
}

impl LabelMatcher {
    pub fn new(
        name: impl Into<String>,
        op: MatchOp,
        value: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        let value = value.into();
        let regex = match op {
            MatchOp::Re | MatchOp::Nre => Some(Regex::new(&format!("^(?:{})$", value))?),
            MatchOp::Eq | MatchOp::Neq => None,
        };
        Ok(Self {
            name: name.into(),
            op,
            value,
            regex,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn op(&self) -> MatchOp {
        self.op
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Tests this matcher against a label set. Absent labels match as the
    /// empty string, following Prometheus selector semantics.
    pub fn matches(&self, labels: &LogLabels) -> bool {
        let actual = labels.value_or_empty(&self.name);
        match self.op {
            MatchOp::Eq => actual == self.value,
            MatchOp::Neq => actual != self.value,
            // The regex is always present for the regex ops.
            MatchOp::Re => self.regex.as_ref().is_some_and(|re| re.is_match(actual)),
            MatchOp::Nre => !self.regex.as_ref().is_some_and(|re| re.is_match(actual)),
        }
    }
}

/// A conjunction of label matchers. The empty selector matches everything.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selector(Vec<LabelMatcher>);

impl Selector {
    pub fn new(matchers: Vec<LabelMatcher>) -> Self {
        Self(matchers)
    }

    pub fn matchers(&self) -> &[LabelMatcher] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, labels: &LogLabels) -> bool {
        self.0.iter().all(|m| m.matches(labels))
    }
}
