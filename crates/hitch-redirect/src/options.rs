use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedirectOptions {
    /// Redirects followed before giving up.
    pub max:       u32,
    /// Keep the original method on 301/302/303 instead of switching to GET.
    pub strict:    bool,
    /// Send the redirected URL as `Referer`.
    pub referer:   bool,
    /// Schemes a `Location` may point to.
    pub protocols: Vec<String>,
}

impl Default for RedirectOptions {
    fn default() -> Self {
        Self {
            max:       5,
            strict:    false,
            referer:   false,
            protocols: vec!["http".to_string(), "https".to_string()],
        }
    }
}

impl RedirectOptions {
    pub fn allows(&self, scheme: &str) -> bool { self.protocols.iter().any(|p| p.eq_ignore_ascii_case(scheme)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_partial_json() {
        let options: RedirectOptions = serde_json::from_str(r#"{"strict": true}"#).unwrap();
        assert_eq!(options.max, 5);
        assert!(options.strict);
        assert!(!options.referer);
        assert!(options.allows("HTTPS"));
        assert!(!options.allows("ftp"));
    }
}
