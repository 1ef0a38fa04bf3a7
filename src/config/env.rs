//! Environment Rewrite Configuration

/// How the launched command's environment is derived from ours
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// Variable names removed before the address variables are added.
    /// Does not apply to LOCAL or unknown-family connections.
    pub exclude: Vec<String>,

    /// Start from an empty environment instead of the inherited one.
    /// LOCAL and unknown-family connections still pass through any
    /// inherited TCP address variables.
    pub clean: bool,
}

impl EnvConfig {
    /// Whether `entry` (`NAME=value`) is named by the exclude list
    pub fn is_excluded(&self, entry: &[u8]) -> bool {
        self.exclude.iter().any(|name| {
            entry.len() > name.len()
                && entry.starts_with(name.as_bytes())
                && entry[name.len()] == b'='
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclude_matches_whole_name() {
        let config = EnvConfig {
            exclude: vec!["HOME".to_string()],
            clean: false,
        };

        assert!(config.is_excluded(b"HOME=/root"));
        assert!(config.is_excluded(b"HOME="));
        assert!(!config.is_excluded(b"HOMEDIR=/root"));
        assert!(!config.is_excluded(b"HOME"));
        assert!(!config.is_excluded(b"PATH=/bin"));
    }

    #[test]
    fn test_default_excludes_nothing() {
        assert!(!EnvConfig::default().is_excluded(b"HOME=/root"));
    }
}
