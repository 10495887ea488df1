//! Name allocation and cleaning.

use std::collections::HashMap;

use arcstr::ArcStr;

/// The longest prefix used for automatically generated component names.
pub const MAX_SHORT_NAME_LEN: usize = 24;

/// Per-prefix counters for automatic component names.
///
/// Names have the form `{prefix}_{n}`, with `n` counting up from 1 for each prefix.
#[derive(Debug, Clone, Default)]
pub struct NameCounters {
    counters: HashMap<ArcStr, u64>,
}

impl NameCounters {
    /// Creates an empty set of counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next name for `short_name` that `in_use` rejects.
    ///
    /// The prefix is `short_name` cut to [`MAX_SHORT_NAME_LEN`] characters.
    pub fn next_name(&mut self, short_name: &str, in_use: impl Fn(&str) -> bool) -> ArcStr {
        let prefix: ArcStr = short_name.chars().take(MAX_SHORT_NAME_LEN).collect::<String>().into();
        let counter = self.counters.entry(prefix.clone()).or_insert(0);
        loop {
            *counter += 1;
            let name = arcstr::format!("{}_{}", prefix, counter);
            if !in_use(&name) {
                return name;
            }
        }
    }

    /// Forgets every counter.
    pub fn reset(&mut self) {
        self.counters.clear();
    }
}

/// Keeps only the characters `[0-9A-Za-z_]` of `name`.
///
/// # Examples
///
/// ```
/// use metal::naming::clean_name;
///
/// assert_eq!(clean_name("pad-top (1)"), "padtop1");
/// assert_eq!(clean_name("trace_0"), "trace_0");
/// ```
pub fn clean_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_per_prefix() {
        let mut names = NameCounters::new();
        assert_eq!(names.next_name("pad", |_| false), "pad_1");
        assert_eq!(names.next_name("pad", |_| false), "pad_2");
        assert_eq!(names.next_name("jj", |_| false), "jj_1");
    }

    #[test]
    fn taken_names_are_skipped() {
        let mut names = NameCounters::new();
        assert_eq!(names.next_name("pad", |n| n == "pad_1" || n == "pad_2"), "pad_3");
    }

    #[test]
    fn long_prefixes_are_cut() {
        let mut names = NameCounters::new();
        let name = names.next_name("a_very_long_component_short_name", |_| false);
        assert_eq!(name, "a_very_long_component_sh_1");
    }
}
