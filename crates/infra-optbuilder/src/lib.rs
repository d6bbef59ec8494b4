//! Accumulates ordered command-line fragments for a single process
//! invocation and renders them into one shell-safe string.
//!
//! No quoting is performed here — fragments are assumed already
//! shell-safe, matching the original's `" ".join(self.__option_list)`.

use infra_errors::{Error, Result};

#[derive(Debug, Default, Clone)]
pub struct OptionBuilder {
    fragments: Vec<String>,
}

impl OptionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `fragment` in insertion order. A fragment already present
    /// (by exact string equality) is dropped with a `tracing::warn!`
    /// instead of being added twice.
    pub fn add(&mut self, fragment: impl Into<String>) {
        let fragment = fragment.into();
        if self.fragments.contains(&fragment) {
            tracing::warn!(%fragment, "duplicate option fragment dropped");
            return;
        }
        self.fragments.push(fragment);
    }

    /// Joins accumulated fragments with single spaces in insertion order.
    /// Fails with `Error::Internal` if nothing was ever added.
    pub fn render(&self) -> Result<String> {
        if self.fragments.is_empty() {
            return Err(Error::Internal("no option in the list".to_string()));
        }
        Ok(self.fragments.join(" "))
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_joins_in_insertion_order() {
        let mut b = OptionBuilder::new();
        b.add("-m 1536");
        b.add("-smp 8");
        assert_eq!(b.render().unwrap(), "-m 1536 -smp 8");
    }

    #[test]
    fn render_fails_when_empty() {
        let b = OptionBuilder::new();
        assert!(matches!(b.render(), Err(Error::Internal(_))));
    }

    #[test]
    fn duplicate_fragment_is_dropped() {
        let mut b = OptionBuilder::new();
        b.add("-cpu host");
        b.add("-cpu host");
        assert_eq!(b.render().unwrap(), "-cpu host");
    }
}
