use std::collections::BTreeMap;
use std::fmt;

/// Replace the characters Kubernetes allows in label keys but Prometheus
/// label names do not (`/`, `-`, `.`) with underscores.
pub fn normalize_label_key(key: &str) -> String {
    key.replace(['/', '-', '.'], "_")
}

/// An immutable set of labels attached to one log source.
///
/// Keys are kept sorted so the rendered form is stable and can be used as
/// the stream identity in query responses.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogLabels(BTreeMap<String, String>);

impl LogLabels {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Value for a key, with absent keys reading as the empty string.
    /// Matchers rely on this so `{foo=""}` selects sources without `foo`.
    pub fn value_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for LogLabels {
    /// Renders the Prometheus text form: `{key="value", other="value"}`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={:?}", key, value)?;
        }
        write!(f, "}}")
    }
}

impl FromIterator<(String, String)> for LogLabels {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
