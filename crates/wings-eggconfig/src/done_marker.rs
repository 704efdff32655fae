// SPDX-License-Identifier: MIT

//! The started-up line matcher: "ready" is raised when a configured
//! done-marker fires against container stdout (spec.md §4.5.1).

use crate::error::EggConfigError;
use regex::Regex;
use wings_core::DoneMarker;

enum CompiledMarker {
    Literal(String),
    Regex(Regex),
}

/// A compiled set of done-markers for one server's boot sequence.
pub struct DoneMarkerMatcher {
    markers: Vec<CompiledMarker>,
}

impl DoneMarkerMatcher {
    pub fn compile(markers: &[DoneMarker]) -> Result<Self, EggConfigError> {
        let compiled = markers
            .iter()
            .map(|marker| match marker {
                DoneMarker::Literal { value } => Ok(CompiledMarker::Literal(value.clone())),
                DoneMarker::Regex { pattern } => Ok(CompiledMarker::Regex(Regex::new(pattern)?)),
            })
            .collect::<Result<Vec<_>, EggConfigError>>()?;
        Ok(Self { markers: compiled })
    }

    /// True if any configured marker matches `line`.
    pub fn matches(&self, line: &str) -> bool {
        self.markers.iter().any(|marker| match marker {
            CompiledMarker::Literal(value) => line.contains(value.as_str()),
            CompiledMarker::Regex(regex) => regex.is_match(line),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_marker_matches_substring() {
        let matcher = DoneMarkerMatcher::compile(&[DoneMarker::Literal { value: "Done".to_string() }]).unwrap();
        assert!(matcher.matches("[12:00:00] Done (3.2s)! For help, type \"help\""));
        assert!(!matcher.matches("still loading"));
    }

    #[test]
    fn regex_marker_matches_pattern() {
        let matcher = DoneMarkerMatcher::compile(&[DoneMarker::Regex { pattern: r"Server thread/INFO.*Done".to_string() }]).unwrap();
        assert!(matcher.matches("[Server thread/INFO]: Done (2.1s)!"));
        assert!(!matcher.matches("[Server thread/WARN]: something else"));
    }

    #[test]
    fn no_markers_never_matches() {
        let matcher = DoneMarkerMatcher::compile(&[]).unwrap();
        assert!(!matcher.matches("anything"));
    }
}
