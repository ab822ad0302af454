use serde::{Deserialize, Serialize};
use std::fmt;

/// Named `(classifier, extension)` conventions for the files published alongside a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Artifact,
    Sources,
    Javadoc,
    Annotations,
    AarArtifact,
    Pom,
    All,
    Http,
    Dll,
    Zip,
    Klib,
}

impl ArtifactKind {
    pub const ALL_KINDS: [ArtifactKind; 11] = [
        ArtifactKind::Artifact,
        ArtifactKind::Sources,
        ArtifactKind::Javadoc,
        ArtifactKind::Annotations,
        ArtifactKind::AarArtifact,
        ArtifactKind::Pom,
        ArtifactKind::All,
        ArtifactKind::Http,
        ArtifactKind::Dll,
        ArtifactKind::Zip,
        ArtifactKind::Klib,
    ];

    #[must_use]
    pub fn classifier(self) -> &'static str {
        match self {
            ArtifactKind::Sources => "sources",
            ArtifactKind::Javadoc => "javadoc",
            ArtifactKind::Annotations => "annotations",
            ArtifactKind::All => "all",
            ArtifactKind::Http => "http",
            ArtifactKind::Artifact
            | ArtifactKind::AarArtifact
            | ArtifactKind::Pom
            | ArtifactKind::Dll
            | ArtifactKind::Zip
            | ArtifactKind::Klib => "",
        }
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Artifact
            | ArtifactKind::Sources
            | ArtifactKind::Javadoc
            | ArtifactKind::All
            | ArtifactKind::Http => "jar",
            ArtifactKind::Annotations | ArtifactKind::Zip => "zip",
            ArtifactKind::AarArtifact => "aar",
            ArtifactKind::Pom => "pom",
            ArtifactKind::Dll => "dll",
            ArtifactKind::Klib => "klib",
        }
    }

    /// Look up the kind registered for a `(classifier, extension)` pair.
    #[must_use]
    pub fn find(classifier: &str, extension: &str) -> Option<ArtifactKind> {
        Self::ALL_KINDS
            .into_iter()
            .find(|kind| kind.classifier() == classifier && kind.extension() == extension)
    }

    /// The file is the artifact itself (in some packaging) rather than an attachment.
    ///
    /// A failure to resolve a primary kind aborts the whole resolution call.
    #[must_use]
    pub fn is_primary(self) -> bool {
        self.classifier().is_empty()
    }

    /// Kinds to request for a library: one primary kind per packaging plus optional attachments.
    ///
    /// Unknown packagings fall back to a plain jar.
    #[must_use]
    pub fn kinds_of(sources: bool, javadoc: bool, packagings: &[&str]) -> Vec<ArtifactKind> {
        let mut kinds = Vec::new();
        for packaging in packagings {
            let kind = match *packaging {
                "aar" => ArtifactKind::AarArtifact,
                "pom" => ArtifactKind::Pom,
                "dll" => ArtifactKind::Dll,
                "zip" => ArtifactKind::Zip,
                "klib" => ArtifactKind::Klib,
                _ => ArtifactKind::Artifact,
            };
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        if kinds.is_empty() {
            kinds.push(ArtifactKind::Artifact);
        }
        if sources {
            kinds.push(ArtifactKind::Sources);
        }
        if javadoc {
            kinds.push(ArtifactKind::Javadoc);
        }
        kinds
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ArtifactKind::Artifact => "artifact",
            ArtifactKind::Sources => "sources",
            ArtifactKind::Javadoc => "javadoc",
            ArtifactKind::Annotations => "annotations",
            ArtifactKind::AarArtifact => "aar_artifact",
            ArtifactKind::Pom => "pom",
            ArtifactKind::All => "all",
            ArtifactKind::Http => "http",
            ArtifactKind::Dll => "dll",
            ArtifactKind::Zip => "zip",
            ArtifactKind::Klib => "klib",
        }
    }

    /// Parse the snake_case name used in configuration files and on the command line.
    #[must_use]
    pub fn from_name(name: &str) -> Option<ArtifactKind> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL_KINDS.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn find_resolves_known_pairs() {
        assert_eq!(ArtifactKind::find("sources", "jar"), Some(ArtifactKind::Sources));
        assert_eq!(ArtifactKind::find("", "jar"), Some(ArtifactKind::Artifact));
        assert_eq!(ArtifactKind::find("annotations", "zip"), Some(ArtifactKind::Annotations));
        assert_eq!(ArtifactKind::find("", "klib"), Some(ArtifactKind::Klib));
    }

    #[test]
    fn find_reports_unknown_pairs() {
        assert_eq!(ArtifactKind::find("bogus", "xyz"), None);
        assert_eq!(ArtifactKind::find("sources", "zip"), None);
    }

    #[test]
    fn every_kind_round_trips_through_its_pair() {
        for kind in ArtifactKind::ALL_KINDS {
            assert_eq!(ArtifactKind::find(kind.classifier(), kind.extension()), Some(kind));
            assert_eq!(ArtifactKind::from_name(kind.name()), Some(kind));
        }
    }

    #[test]
    fn only_unclassified_kinds_are_primary() {
        assert!(ArtifactKind::Artifact.is_primary());
        assert!(ArtifactKind::Pom.is_primary());
        assert!(ArtifactKind::AarArtifact.is_primary());
        assert!(!ArtifactKind::Sources.is_primary());
        assert!(!ArtifactKind::Javadoc.is_primary());
        assert!(!ArtifactKind::All.is_primary());
    }

    #[test]
    fn kinds_of_builds_primary_then_attachments() {
        assert_eq!(
            ArtifactKind::kinds_of(true, true, &["aar"]),
            vec![
                ArtifactKind::AarArtifact,
                ArtifactKind::Sources,
                ArtifactKind::Javadoc
            ]
        );
        assert_eq!(
            ArtifactKind::kinds_of(false, true, &[]),
            vec![ArtifactKind::Artifact, ArtifactKind::Javadoc]
        );
        assert_eq!(
            ArtifactKind::kinds_of(false, false, &["jar", "bundle"]),
            vec![ArtifactKind::Artifact]
        );
    }
}
