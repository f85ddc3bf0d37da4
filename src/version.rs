//! Kernel versions parsed from source directory names.
//!
//! Gentoo installs kernel sources as `linux-<major>.<minor>.<patch>-gentoo[-r<N>]`.
//! The same version also names the module tree (`/lib/modules/<suffix>`) and
//! appears inside every boot artifact (`vmlinuz-<suffix>`, `System.map-<suffix>`,
//! ...), so one parsed [`KernelVersion`] reconstructs all of them.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseVersionError;

const DIR_MARKER: &str = "linux-";
const GENTOO_SUFFIX: &str = "-gentoo";
const REVISION_MARKER: &str = "-r";

/// A kernel version ordered by (major, minor, patch, revision).
///
/// A missing revision sorts before any real one, so `4.14.8` precedes
/// `4.14.8-r1`. Field order matters: `Ord` is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KernelVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub revision: Option<u32>,
}

impl KernelVersion {
    pub fn new(major: u32, minor: u32, patch: u32, revision: Option<u32>) -> Self {
        Self {
            major,
            minor,
            patch,
            revision,
        }
    }

    /// Parse a kernel directory name or path.
    ///
    /// Everything up to the last `linux-` is dropped, as is `-gentoo`.
    /// Exactly three dotted numeric components must remain, optionally
    /// followed by `-r<N>`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use kernel_updater::version::KernelVersion;
    ///
    /// let v = KernelVersion::parse("/usr/src/linux-4.14.8-gentoo-r1").unwrap();
    /// assert_eq!(v, KernelVersion::new(4, 14, 8, Some(1)));
    /// assert_eq!(v.directory_suffix(), "4.14.8-gentoo-r1");
    /// ```
    pub fn parse(name: &str) -> Result<Self, ParseVersionError> {
        let rest = match name.rfind(DIR_MARKER) {
            Some(idx) => &name[idx + DIR_MARKER.len()..],
            None => name,
        };
        let rest = rest.replace(GENTOO_SUFFIX, "");

        let (numbers, revision) = match rest.split_once(REVISION_MARKER) {
            Some((numbers, revision)) => {
                let revision = parse_component(name, revision, "revision")?;
                (numbers, Some(revision))
            }
            None => (rest.as_str(), None),
        };

        let parts: Vec<&str> = numbers.split('.').collect();
        if parts.len() < 3 {
            return Err(ParseVersionError::new(
                name,
                format!("expected major.minor.patch, found {} component(s)", parts.len()),
            ));
        }
        if parts.len() > 3 {
            return Err(ParseVersionError::new(
                name,
                format!("unexpected extra component '{}'", parts[3..].join(".")),
            ));
        }

        Ok(Self {
            major: parse_component(name, parts[0], "major")?,
            minor: parse_component(name, parts[1], "minor")?,
            patch: parse_component(name, parts[2], "patch")?,
            revision,
        })
    }

    /// `<major>.<minor>.<patch>-gentoo[-r<N>]`: the module tree name and the
    /// substring carried by boot artifacts.
    pub fn directory_suffix(&self) -> String {
        let mut suffix = format!("{}.{}.{}{}", self.major, self.minor, self.patch, GENTOO_SUFFIX);
        if let Some(revision) = self.revision {
            suffix.push_str(&format!("{REVISION_MARKER}{revision}"));
        }
        suffix
    }

    /// `linux-<directory_suffix>`: the source tree name under the kernel root.
    pub fn source_dir_name(&self) -> String {
        format!("{DIR_MARKER}{}", self.directory_suffix())
    }

    /// `<major>.<minor>.<patch>[-r<N>]`: the package manager's version.
    pub fn display_string(&self) -> String {
        self.to_string()
    }

    /// Exact-version atom for the package manager, e.g. `=gentoo-sources-4.11.8`.
    pub fn package_atom(&self, package: &str) -> String {
        format!("={package}-{self}")
    }
}

impl fmt::Display for KernelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(revision) = self.revision {
            write!(f, "{REVISION_MARKER}{revision}")?;
        }
        Ok(())
    }
}

impl FromStr for KernelVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_component(name: &str, raw: &str, what: &str) -> Result<u32, ParseVersionError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseVersionError::new(
            name,
            format!("{what} component '{raw}' is not a number"),
        ));
    }
    raw.parse()
        .map_err(|e| ParseVersionError::new(name, format!("{what} component '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(name: &str) -> KernelVersion {
        KernelVersion::parse(name).unwrap()
    }

    #[test]
    fn test_parse_plain_gentoo_dir() {
        assert_eq!(v("linux-4.12.4-gentoo"), KernelVersion::new(4, 12, 4, None));
    }

    #[test]
    fn test_parse_revision() {
        assert_eq!(v("linux-4.14.8-gentoo-r1"), KernelVersion::new(4, 14, 8, Some(1)));
    }

    #[test]
    fn test_equivalent_names_parse_equal() {
        let canonical = v("linux-4.12.4-gentoo");
        assert_eq!(v("/usr/src/linux-4.12.4-gentoo"), canonical);
        assert_eq!(v("linux-4.12.4"), canonical);
        assert_eq!(v("4.12.4-gentoo"), canonical);
    }

    #[test]
    fn test_prefix_stripped_up_to_last_marker() {
        assert_eq!(
            v("/mnt/linux-backup/linux-4.13.16-gentoo"),
            KernelVersion::new(4, 13, 16, None)
        );
    }

    #[test]
    fn test_ordering_follows_kernel_precedence() {
        let mut versions = vec![
            v("linux-4.12.4-gentoo"),
            v("linux-4.12.2-gentoo"),
            v("linux-4.11.8-gentoo"),
            v("linux-4.12.3-gentoo"),
        ];
        versions.sort();
        let names: Vec<String> = versions.iter().map(|v| v.to_string()).collect();
        assert_eq!(names, ["4.11.8", "4.12.2", "4.12.3", "4.12.4"]);
    }

    #[test]
    fn test_revision_sorts_between_patches() {
        assert!(v("linux-4.14.8-gentoo") < v("linux-4.14.8-gentoo-r1"));
        assert!(v("linux-4.14.8-gentoo-r1") < v("linux-4.14.10-gentoo"));
    }

    #[test]
    fn test_numeric_not_lexicographic() {
        assert!(v("linux-4.9.0-gentoo") < v("linux-4.10.0-gentoo"));
    }

    #[test]
    fn test_suffix_and_display_round_trip() {
        for name in ["linux-4.11.8-gentoo", "linux-4.14.8-gentoo-r1", "linux-5.4.0-gentoo-r12"] {
            let parsed = v(name);
            assert_eq!(parsed.source_dir_name(), name);
            assert_eq!(v(&parsed.source_dir_name()), parsed);
        }
        assert_eq!(v("linux-4.14.8-gentoo-r1").display_string(), "4.14.8-r1");
        assert_eq!(v("linux-4.11.8-gentoo").display_string(), "4.11.8");
    }

    #[test]
    fn test_package_atom() {
        assert_eq!(
            v("linux-4.14.8-gentoo-r1").package_atom("gentoo-sources"),
            "=gentoo-sources-4.14.8-r1"
        );
    }

    #[test]
    fn test_rejects_too_few_components() {
        let err = KernelVersion::parse("linux-4.12-gentoo").unwrap_err();
        assert!(err.reason.contains("2 component"));
    }

    #[test]
    fn test_rejects_non_numeric() {
        assert!(KernelVersion::parse("linux-4.12.x-gentoo").is_err());
        assert!(KernelVersion::parse("linux-4.12.4-gentoo-rc1").is_err());
        assert!(KernelVersion::parse("linux-4..4-gentoo").is_err());
        assert!(KernelVersion::parse("linux").is_err());
    }

    #[test]
    fn test_rejects_extra_components() {
        assert!(KernelVersion::parse("linux-4.12.4.1-gentoo").is_err());
    }

    #[test]
    fn test_from_str() {
        let parsed: KernelVersion = "linux-4.13.16-gentoo".parse().unwrap();
        assert_eq!(parsed, KernelVersion::new(4, 13, 16, None));
    }
}
