//! Ordered, case-insensitive header multi-map.
//!
//! Names keep the casing they were first given for output, while lookups go
//! through a lowercased index.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    name:   String,
    values: Vec<String>,
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<(String, Vec<String>)>", into = "Vec<(String, Vec<String>)>")]
pub struct Headers {
    entries: Vec<Entry>,
    index:   HashMap<String, usize>,
}

fn normalize(name: &str) -> String { name.trim().to_ascii_lowercase() }

impl Headers {
    pub fn new() -> Self { Self::default() }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entry(name)
            .and_then(|e| e.values.first())
            .map(String::as_str)
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.entry(name)
            .map(|e| e.values.as_slice())
            .unwrap_or(&[])
    }

    /// All values of `name` joined with `", "`.
    pub fn joined(&self, name: &str) -> Option<String> { self.entry(name).map(|e| e.values.join(", ")) }

    pub fn contains(&self, name: &str) -> bool { self.index.contains_key(&normalize(name)) }

    /// Replaces every value of `name`, keeping its position.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let key = normalize(&name);
        match self.index.get(&key) {
            Some(&i) => {
                let entry = &mut self.entries[i];
                entry.name = name;
                entry.values = vec![value.into()];
            },
            None => self.push(key, name, value.into()),
        }
    }

    /// Adds a value to `name`, keeping existing ones.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let key = normalize(&name);
        match self.index.get(&key) {
            Some(&i) => self.entries[i].values.push(value.into()),
            None => self.push(key, name, value.into()),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        let i = self.index.remove(&normalize(name))?;
        let entry = self.entries.remove(i);
        for position in self.index.values_mut() {
            if *position > i {
                *position -= 1;
            }
        }
        Some(entry.values)
    }

    /// `(display name, values)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|e| (e.name.as_str(), e.values.as_slice()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> { self.entries.iter().map(|e| e.name.as_str()) }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    fn entry(&self, name: &str) -> Option<&Entry> {
        self.index
            .get(&normalize(name))
            .map(|&i| &self.entries[i])
    }

    fn push(&mut self, key: String, name: String, value: String) {
        self.index.insert(key, self.entries.len());
        self.entries.push(Entry {
            name,
            values: vec![value],
        });
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|e| (&e.name, &e.values)))
            .finish()
    }
}

impl From<Vec<(String, Vec<String>)>> for Headers {
    fn from(pairs: Vec<(String, Vec<String>)>) -> Self {
        let mut headers = Headers::new();
        for (name, values) in pairs {
            for value in values {
                headers.append(name.clone(), value);
            }
        }
        headers
    }
}

impl From<Headers> for Vec<(String, Vec<String>)> {
    fn from(headers: Headers) -> Self {
        headers
            .entries
            .into_iter()
            .map(|e| (e.name, e.values))
            .collect()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut headers = Headers::new();
        headers.set("Content-Type", "text/plain");

        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(headers.names().collect::<Vec<_>>(), vec!["Content-Type"]);
    }

    #[test]
    fn test_append_and_join() {
        let mut headers = Headers::new();
        headers.append("Cache-Control", "no-cache");
        headers.append("cache-control", "max-age=0");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("Cache-Control"), Some("no-cache"));
        assert_eq!(headers.joined("Cache-Control").as_deref(), Some("no-cache, max-age=0"));
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut headers: Headers = [("A", "1"), ("B", "2"), ("C", "3")].into_iter().collect();
        headers.set("b", "two");

        let flat: Vec<_> = headers.iter().map(|(n, v)| (n.to_string(), v.to_vec())).collect();
        assert_eq!(flat[1], ("b".to_string(), vec!["two".to_string()]));
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn test_remove_reindexes() {
        let mut headers: Headers = [("A", "1"), ("B", "2"), ("C", "3")].into_iter().collect();

        assert_eq!(headers.remove("a"), Some(vec!["1".to_string()]));
        assert_eq!(headers.remove("missing"), None);
        assert_eq!(headers.get("C"), Some("3"));
        assert_eq!(headers.get("B"), Some("2"));
        headers.set("c", "three");
        assert_eq!(headers.get_all("C"), &["three".to_string()]);
    }

    #[test]
    fn test_serde_preserves_order_and_case() {
        let headers: Headers = [("X-First", "1"), ("set-cookie", "a=b"), ("set-cookie", "c=d")]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&headers).unwrap();
        let back: Headers = serde_json::from_str(&json).unwrap();

        assert_eq!(back, headers);
        assert_eq!(back.get_all("Set-Cookie").len(), 2);
    }
}
