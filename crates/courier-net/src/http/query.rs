//! Query-string construction.

use serde_json::Value;
use url::form_urlencoded;

/// Flat, string-keyed query parameters.
///
/// Keys are unique; inserting an existing key replaces its value in place.
/// Iteration follows insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, consuming and returning the set.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a parameter, replacing the value of an existing key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.pairs.push((key, value)),
        }
    }

    /// Get the value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Check if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterate over `(key, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Build parameters from the members of a JSON object.
    ///
    /// Strings are used verbatim, `null` becomes an empty string and every
    /// other value contributes its JSON text. Anything but an object yields
    /// an empty set.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Object(map) => map
                .iter()
                .map(|(key, value)| (key.clone(), json_param_value(value)))
                .collect(),
            _ => Self::default(),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

fn json_param_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Append percent-encoded query parameters to `url`.
///
/// - `None` or empty params return the URL unchanged.
/// - A URL without `?` gets one before the first parameter.
/// - A URL that already has a query gets `&`-joined parameters and no
///   second `?`.
/// - Empty keys are skipped without disturbing the separators.
///
/// ```
/// use courier_net::http::{QueryParams, encode_query};
///
/// let params = QueryParams::new().with("q", "a b");
/// assert_eq!(
///     encode_query("https://api.example.com/items", Some(&params)),
///     "https://api.example.com/items?q=a%20b"
/// );
/// ```
pub fn encode_query(url: &str, params: Option<&QueryParams>) -> String {
    let Some(params) = params.filter(|p| !p.is_empty()) else {
        return url.to_string();
    };

    let mut separator = if !url.contains('?') {
        Some('?')
    } else if url.ends_with('?') || url.ends_with('&') {
        None
    } else {
        Some('&')
    };

    let mut encoded = String::from(url);
    for (key, value) in params.iter() {
        if key.is_empty() {
            continue;
        }
        if let Some(sep) = separator {
            encoded.push(sep);
        }
        encoded.push_str(&encode_component(key));
        encoded.push('=');
        encoded.push_str(&encode_component(value));
        separator = Some('&');
    }
    encoded
}

/// Percent-encode one key or value (UTF-8). Space becomes `%20`.
fn encode_component(component: &str) -> String {
    // The form serializer writes space as `+` and a literal `+` as `%2B`,
    // so every `+` in its output stands for a space.
    form_urlencoded::byte_serialize(component.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
