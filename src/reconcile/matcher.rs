//! Matching on-disk files against manual artifact identifiers

use std::path::Path;

/// Decides whether a file on disk is a manual artifact
pub trait ManualMatcher: Send + Sync {
    /// Whether `file_name` satisfies the artifact called `identifier`
    fn matches(&self, file_name: &str, identifier: &str) -> bool;
}

/// Case-insensitive containment of the identifier in the file name
///
/// The default. `mekanism-1.20.jar` satisfies `mekanism`, and so does
/// `mekanism-generators-1.20.jar`, which is why the first matching artifact
/// in manifest order claims a file. Surrounding whitespace in the identifier
/// is ignored, and a blank identifier matches nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct SubstringMatcher;

impl ManualMatcher for SubstringMatcher {
    fn matches(&self, file_name: &str, identifier: &str) -> bool {
        let identifier = identifier.trim();
        !identifier.is_empty() && file_name.to_lowercase().contains(&identifier.to_lowercase())
    }
}

/// Case-insensitive equality of the file stem and the identifier
#[derive(Clone, Copy, Debug, Default)]
pub struct ExactStemMatcher;

impl ManualMatcher for ExactStemMatcher {
    fn matches(&self, file_name: &str, identifier: &str) -> bool {
        Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|stem| stem.eq_ignore_ascii_case(identifier.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_is_case_insensitive() {
        assert!(SubstringMatcher.matches("Mekanism-1.20.jar", "mekanism"));
        assert!(SubstringMatcher.matches("mekanism-1.20.jar", "MEKANISM"));
        assert!(!SubstringMatcher.matches("create-0.5.jar", "mekanism"));
    }

    #[test]
    fn empty_identifier_matches_nothing() {
        assert!(!SubstringMatcher.matches("anything.jar", ""));
        assert!(!SubstringMatcher.matches("anything.jar", "  "));
    }

    #[test]
    fn exact_stem_requires_whole_stem() {
        assert!(ExactStemMatcher.matches("Optifine.jar", "optifine"));
        assert!(!ExactStemMatcher.matches("optifine-hd.jar", "optifine"));
    }
}
