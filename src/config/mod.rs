use std::env;

const SELF_BINDING_VAR: &str = "INJEXIT_SELF_BINDING";
const MAX_DEPTH_VAR: &str = "INJEXIT_MAX_DEPTH";

/// Container-wide resolution settings
///
/// Child containers inherit the settings of the container that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Resolve unbound concrete types by binding them to themselves
    pub self_binding_fallback: bool,
    /// Maximum nesting of resolutions before giving up
    pub max_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            self_binding_fallback: true,
            max_depth: 128,
        }
    }
}

impl Settings {
    /// Load settings from the process environment, falling back to defaults
    /// for unset or unparsable variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let self_binding_fallback = lookup(SELF_BINDING_VAR)
            .and_then(|v| parse_flag(&v))
            .unwrap_or(defaults.self_binding_fallback);
        let max_depth = lookup(MAX_DEPTH_VAR)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|depth| *depth > 0)
            .unwrap_or(defaults.max_depth);
        Self {
            self_binding_fallback,
            max_depth,
        }
    }

    pub fn with_self_binding_fallback(mut self, enabled: bool) -> Self {
        self.self_binding_fallback = enabled;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(Settings::from_lookup(lookup(&[])), Settings::default());
    }

    #[test]
    fn test_reads_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            (SELF_BINDING_VAR, "off"),
            (MAX_DEPTH_VAR, "16"),
        ]));
        assert!(!settings.self_binding_fallback);
        assert_eq!(settings.max_depth, 16);
    }

    #[test]
    fn test_ignores_garbage() {
        let settings = Settings::from_lookup(lookup(&[
            (SELF_BINDING_VAR, "maybe"),
            (MAX_DEPTH_VAR, "0"),
        ]));
        assert_eq!(settings, Settings::default());
    }
}
