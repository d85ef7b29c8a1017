//! Toolchain version parsing and gating.
//!
//! Toolchain vendors do not speak semver: MSVC reports `14.38.33130`,
//! Windows SDKs `10.0.22621.0`, and configuration files say `"14.38"`.
//! Everything is normalised into a `semver::Version` so comparison is
//! always componentwise and numeric.

pub use semver::Version;

/// Parse a version with one to four dotted numeric components.
///
/// Missing minor/patch components are zero. A fourth component (the
/// Windows SDK "revision") is accepted and ignored. Surrounding
/// whitespace and a trailing path separator, as found in
/// `WindowsSDKVersion=10.0.22621.0\`, are stripped.
pub fn parse_version_lenient(s: &str) -> Option<Version> {
    let s = s.trim().trim_end_matches(['\\', '/']);

    if let Ok(v) = s.parse() {
        return Some(v);
    }

    let parts: Vec<&str> = s.split('.').collect();
    if parts.is_empty() || parts.len() > 4 {
        return None;
    }

    let mut numbers = [0u64; 3];
    for (slot, part) in numbers.iter_mut().zip(parts.iter()) {
        *slot = part.parse().ok()?;
    }
    if parts.len() == 4 {
        // Validate the revision even though it does not participate.
        parts[3].parse::<u64>().ok()?;
    }

    Some(Version::new(numbers[0], numbers[1], numbers[2]))
}

/// Returns true when `found` satisfies `minimum` (`found >= minimum`).
pub fn meets_minimum(found: &Version, minimum: &Version) -> bool {
    found >= minimum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_lenient() {
        assert_eq!(parse_version_lenient("20"), Some(Version::new(20, 0, 0)));
        assert_eq!(parse_version_lenient("14.38"), Some(Version::new(14, 38, 0)));
        assert_eq!(
            parse_version_lenient("14.38.33130"),
            Some(Version::new(14, 38, 33130))
        );
    }

    #[test]
    fn test_parse_windows_sdk_version() {
        assert_eq!(
            parse_version_lenient("10.0.22621.0\\"),
            Some(Version::new(10, 0, 22621))
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_version_lenient(""), None);
        assert_eq!(parse_version_lenient("abc"), None);
        assert_eq!(parse_version_lenient("1.2.3.4.5"), None);
        assert_eq!(parse_version_lenient("1.x"), None);
    }

    #[test]
    fn test_comparison_is_numeric() {
        let found = parse_version_lenient("14.100").unwrap();
        let minimum = parse_version_lenient("14.38").unwrap();
        // A string comparison would put "14.100" before "14.38".
        assert!(meets_minimum(&found, &minimum));
    }

    #[test]
    fn test_equal_meets_minimum() {
        let v = Version::new(20, 0, 0);
        assert!(meets_minimum(&v, &v));
        assert!(!meets_minimum(&Version::new(19, 1, 7), &v));
    }

    #[test]
    fn test_one_minor_below_fails() {
        let minimum = parse_version_lenient("14.38").unwrap();
        assert!(!meets_minimum(&parse_version_lenient("14.37.33130").unwrap(), &minimum));
        assert!(meets_minimum(&parse_version_lenient("14.38.0").unwrap(), &minimum));
        assert!(meets_minimum(&parse_version_lenient("14.38.1").unwrap(), &minimum));
    }
}
