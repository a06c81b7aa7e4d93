//! Version classification for release train projects.
//!
//! A version string is classified purely from its suffix:
//!
//! | Suffix                             | Kind                   |
//! |------------------------------------|------------------------|
//! | `-SNAPSHOT`, `.BUILD-SNAPSHOT`     | [`VersionKind::Snapshot`] |
//! | `.M<n>`, `-M<n>`                   | [`VersionKind::Milestone`] |
//! | `.RC<n>`, `-RC<n>`                 | [`VersionKind::ReleaseCandidate`] |
//! | `.SR<n>`, `-SR<n>`                 | [`VersionKind::ServiceRelease`] |
//! | `.RELEASE`, `.GA`, plain `x.y.z`   | [`VersionKind::Release`] |
//!
//! Anything else fails with [`ReleaseError::UnrecognizedVersionFormat`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ReleaseError, Result};

const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";
const RELEASE_SUFFIXES: &[&str] = &[".RELEASE", ".GA"];
const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2";
const MILESTONE_REPO_LINK: &str =
    "[Spring Milestone](https://repo.spring.io/milestone/) repository";

/// Semantic kind of a version string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "number")]
pub enum VersionKind {
    Snapshot,
    Milestone(u32),
    ReleaseCandidate(u32),
    ServiceRelease(u32),
    Release,
}

impl VersionKind {
    /// Short qualifier code, e.g. `SR3`, `M1`, `RELEASE`.
    pub fn code(&self) -> String {
        match self {
            VersionKind::Snapshot => "SNAPSHOT".to_string(),
            VersionKind::Milestone(n) => format!("M{n}"),
            VersionKind::ReleaseCandidate(n) => format!("RC{n}"),
            VersionKind::ServiceRelease(n) => format!("SR{n}"),
            VersionKind::Release => "RELEASE".to_string(),
        }
    }

    /// A canonical version string of this kind built on `base`.
    ///
    /// `classify(&kind.representative(base))` recovers `kind` for any
    /// dotted numeric `base`.
    pub fn representative(&self, base: &str) -> String {
        match self {
            VersionKind::Snapshot => format!("{base}{SNAPSHOT_SUFFIX}"),
            other => format!("{base}.{}", other.code()),
        }
    }
}

impl fmt::Display for VersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionKind::Snapshot => write!(f, "Snapshot"),
            VersionKind::Milestone(n) => write!(f, "Milestone {n}"),
            VersionKind::ReleaseCandidate(n) => write!(f, "Release Candidate {n}"),
            VersionKind::ServiceRelease(n) => write!(f, "Service Release {n}"),
            VersionKind::Release => write!(f, "General Availability"),
        }
    }
}

/// Classify a version string by its suffix.
pub fn classify(version: &str) -> Result<VersionKind> {
    let unrecognized = || ReleaseError::UnrecognizedVersionFormat {
        version: version.to_string(),
    };

    if version.is_empty() || version.chars().any(char::is_whitespace) {
        return Err(unrecognized());
    }

    if let Some(base) = version.strip_suffix(SNAPSHOT_SUFFIX) {
        return if base.is_empty() {
            Err(unrecognized())
        } else {
            Ok(VersionKind::Snapshot)
        };
    }

    for suffix in RELEASE_SUFFIXES {
        if let Some(base) = version.strip_suffix(suffix) {
            return if base.is_empty() {
                Err(unrecognized())
            } else {
                Ok(VersionKind::Release)
            };
        }
    }

    let split = version.rfind(['.', '-']).ok_or_else(unrecognized)?;
    let (base, qualifier) = (&version[..split], &version[split + 1..]);
    if base.is_empty() || qualifier.is_empty() {
        return Err(unrecognized());
    }

    let numbered: [(&str, fn(u32) -> VersionKind); 3] = [
        ("SR", VersionKind::ServiceRelease),
        ("RC", VersionKind::ReleaseCandidate),
        ("M", VersionKind::Milestone),
    ];
    for (prefix, kind) in numbered {
        if let Some(number) = qualifier.strip_prefix(prefix) {
            return parse_ordinal(number).map(kind).ok_or_else(unrecognized);
        }
    }

    if is_plain_numeric(version) {
        return Ok(VersionKind::Release);
    }

    Err(unrecognized())
}

/// Plain non-negative integer; no sign, no whitespace, no empty string.
fn parse_ordinal(s: &str) -> Option<u32> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn is_plain_numeric(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() >= 2
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

/// A project paired with a classified version.
///
/// Two values are equal when project name and version string are equal; the
/// kind is always re-derived from the version string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProjectVersion {
    project_name: String,
    version: String,
    kind: VersionKind,
}

impl ProjectVersion {
    /// Build from a literal version string, classifying it.
    pub fn new(project_name: impl Into<String>, version: impl Into<String>) -> Result<Self> {
        let version = version.into();
        let kind = classify(&version)?;
        Ok(Self {
            project_name: project_name.into(),
            version,
            kind,
        })
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn kind(&self) -> VersionKind {
        self.kind
    }

    /// Same version string, attributed to another project.
    pub fn for_project(&self, project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            version: self.version.clone(),
            kind: self.kind,
        }
    }

    pub fn is_snapshot(&self) -> bool {
        self.kind == VersionKind::Snapshot
    }

    /// Final (GA) release only.
    pub fn is_release(&self) -> bool {
        self.kind == VersionKind::Release
    }

    pub fn is_service_release(&self) -> bool {
        matches!(self.kind, VersionKind::ServiceRelease(_))
    }

    pub fn is_release_or_service_release(&self) -> bool {
        self.is_release() || self.is_service_release()
    }

    pub fn is_milestone_or_candidate(&self) -> bool {
        matches!(
            self.kind,
            VersionKind::Milestone(_) | VersionKind::ReleaseCandidate(_)
        )
    }

    /// Milestones, release candidates and snapshots are published to the
    /// milestone repository rather than Maven Central.
    pub fn is_non_release(&self) -> bool {
        !self.is_release_or_service_release()
    }

    /// Human-readable availability line, e.g. `Service Release 3 (SR3)`.
    pub fn availability(&self) -> String {
        match self.kind {
            VersionKind::Release => "General Availability (RELEASE)".to_string(),
            VersionKind::Snapshot => "Snapshot (SNAPSHOT)".to_string(),
            kind => format!("{kind} ({})", kind.code()),
        }
    }

    /// Leading segment of the version, e.g. `Dalston` for `Dalston.SR3`.
    pub fn release_name(&self) -> &str {
        self.version
            .split_once('.')
            .map(|(name, _)| name)
            .unwrap_or(&self.version)
    }

    /// Markdown link to where the artifacts of this version are published.
    ///
    /// `artifact_path` is the repository path of the BOM artifact, e.g.
    /// `org/springframework/cloud/spring-cloud-dependencies`.
    pub fn release_link(&self, artifact_path: &str) -> String {
        if self.is_non_release() {
            return MILESTONE_REPO_LINK.to_string();
        }
        format!(
            "[Maven Central]({MAVEN_CENTRAL}/{}/{}/)",
            artifact_path.trim_matches('/'),
            self.version
        )
    }
}

impl fmt::Display for ProjectVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project_name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pv(version: &str) -> ProjectVersion {
        ProjectVersion::new("spring-cloud-sleuth", version).unwrap()
    }

    #[test]
    fn test_classify_snapshots() {
        assert_eq!(classify("2021.0.0-SNAPSHOT").unwrap(), VersionKind::Snapshot);
        assert_eq!(
            classify("1.0.0.BUILD-SNAPSHOT").unwrap(),
            VersionKind::Snapshot
        );
    }

    #[test]
    fn test_classify_numbered_qualifiers() {
        assert_eq!(classify("2021.0.0.SR3").unwrap(), VersionKind::ServiceRelease(3));
        assert_eq!(classify("Hoxton.SR12").unwrap(), VersionKind::ServiceRelease(12));
        assert_eq!(classify("2021.0.0-M1").unwrap(), VersionKind::Milestone(1));
        assert_eq!(classify("1.2.0.RC2").unwrap(), VersionKind::ReleaseCandidate(2));
        assert_eq!(classify("1.2.0.M0").unwrap(), VersionKind::Milestone(0));
    }

    #[test]
    fn test_classify_final_releases() {
        assert_eq!(classify("2021.0.0.RELEASE").unwrap(), VersionKind::Release);
        assert_eq!(classify("Dalston.RELEASE").unwrap(), VersionKind::Release);
        assert_eq!(classify("1.0.0.GA").unwrap(), VersionKind::Release);
        assert_eq!(classify("2021.0.0").unwrap(), VersionKind::Release);
    }

    #[test]
    fn test_classify_rejects_missing_or_bad_ordinal() {
        for bad in ["1.0.0.M", "1.0.0.RC", "1.0.0.SRx", "1.0.0.M-1", "1.0.0.M+1"] {
            let err = classify(bad).unwrap_err();
            assert!(
                matches!(err, ReleaseError::UnrecognizedVersionFormat { .. }),
                "{bad} should not classify"
            );
        }
    }

    #[test]
    fn test_classify_rejects_unknown_suffixes() {
        for bad in ["", "1.0.0.FOO", "latest", "-SNAPSHOT", ".RELEASE", "1", "1.0.0 RELEASE"] {
            assert!(classify(bad).is_err(), "{bad:?} should not classify");
        }
    }

    #[test]
    fn test_classify_is_deterministic() {
        for v in ["2021.0.0-SNAPSHOT", "2021.0.0.SR3", "1.0.0.RC1", "1.0.0.RELEASE"] {
            assert_eq!(classify(v).unwrap(), classify(v).unwrap());
        }
    }

    #[test]
    fn test_representative_roundtrip() {
        let kinds = [
            VersionKind::Snapshot,
            VersionKind::Milestone(4),
            VersionKind::ReleaseCandidate(1),
            VersionKind::ServiceRelease(7),
            VersionKind::Release,
        ];
        for kind in kinds {
            assert_eq!(classify(&kind.representative("2021.0.0")).unwrap(), kind);
        }
    }

    #[test]
    fn test_predicates() {
        assert!(pv("1.0.0-SNAPSHOT").is_snapshot());
        assert!(pv("1.0.0.RELEASE").is_release());
        assert!(pv("1.0.0.SR1").is_service_release());
        assert!(pv("1.0.0.SR1").is_release_or_service_release());
        assert!(pv("1.0.0.M2").is_milestone_or_candidate());
        assert!(pv("1.0.0.RC2").is_milestone_or_candidate());
        assert!(!pv("1.0.0.RELEASE").is_milestone_or_candidate());
        assert!(pv("1.0.0.RC2").is_non_release());
        assert!(!pv("1.0.0.SR2").is_non_release());
    }

    #[test]
    fn test_availability_text() {
        assert_eq!(pv("2021.0.0.SR3").availability(), "Service Release 3 (SR3)");
        assert_eq!(pv("Dalston.RELEASE").availability(), "General Availability (RELEASE)");
        assert_eq!(pv("Dalston.RC1").availability(), "Release Candidate 1 (RC1)");
        assert_eq!(pv("Dalston.M2").availability(), "Milestone 2 (M2)");
    }

    #[test]
    fn test_release_name_and_link() {
        let version = pv("Dalston.SR3");
        assert_eq!(version.release_name(), "Dalston");
        assert_eq!(
            version.release_link("org/springframework/cloud/spring-cloud-dependencies"),
            "[Maven Central](https://repo1.maven.org/maven2/\
             org/springframework/cloud/spring-cloud-dependencies/Dalston.SR3/)"
        );
        assert!(pv("Dalston.M1")
            .release_link("ignored")
            .contains("repo.spring.io/milestone"));
    }

    #[test]
    fn test_equality_ignores_nothing_but_name_and_version() {
        assert_eq!(pv("1.0.0.RELEASE"), pv("1.0.0.RELEASE"));
        assert_ne!(pv("1.0.0.RELEASE"), pv("1.0.1.RELEASE"));
        assert_ne!(
            ProjectVersion::new("a", "1.0.0.RELEASE").unwrap(),
            ProjectVersion::new("b", "1.0.0.RELEASE").unwrap()
        );
    }

    #[test]
    fn test_project_version_rejects_unknown_format() {
        assert!(ProjectVersion::new("a", "nope").is_err());
    }
}
