//! Release naming scheme
//!
//! Every generation of a service shares a prefix. The suffix after the
//! `__` delimiter tells generations apart: a revision number, the fixed
//! inactive slot, or an interim leftover from an interrupted swap.

pub const DELIMITER: &str = "__";
pub const INACTIVE_SUFFIX: &str = "INACTIVE";
pub const INTERIM_SUFFIX: &str = "interim";

/// Classification of a name under a prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseName {
    /// Exactly the prefix
    Canonical,
    Revision(u32),
    Inactive,
    Interim,
}

impl ReleaseName {
    /// Ordering used to pick the newest non-active member.
    pub(crate) fn rank(self) -> i64 {
        match self {
            ReleaseName::Inactive => i64::MAX,
            ReleaseName::Revision(n) => i64::from(n),
            ReleaseName::Canonical => -1,
            ReleaseName::Interim => -2,
        }
    }
}

/// Parse `name` relative to `prefix`; `None` when it is not a member.
pub fn parse_release_name(prefix: &str, name: &str) -> Option<ReleaseName> {
    if name == prefix {
        return Some(ReleaseName::Canonical);
    }

    let suffix = name.strip_prefix(prefix)?.strip_prefix(DELIMITER)?;
    if suffix.eq_ignore_ascii_case(INACTIVE_SUFFIX) {
        Some(ReleaseName::Inactive)
    } else if suffix.eq_ignore_ascii_case(INTERIM_SUFFIX) {
        Some(ReleaseName::Interim)
    } else if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
        suffix.parse().ok().map(ReleaseName::Revision)
    } else {
        None
    }
}

pub fn is_member(prefix: &str, name: &str) -> bool {
    parse_release_name(prefix, name).is_some()
}

/// Revision number after the last delimiter, if numeric.
pub fn revision_of(name: &str) -> Option<u32> {
    let (_, suffix) = name.rsplit_once(DELIMITER)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Next revision after `max`; the first generation is revision 0.
pub fn next_revision(max: Option<u32>) -> u32 {
    max.map_or(0, |max| max + 1)
}

pub fn versioned_name(prefix: &str, revision: u32) -> String {
    format!("{}{}{}", prefix, DELIMITER, revision)
}

pub fn inactive_name(prefix: &str) -> String {
    format!("{}{}{}", prefix, DELIMITER, INACTIVE_SUFFIX)
}

pub fn interim_name(prefix: &str) -> String {
    format!("{}{}{}", prefix, DELIMITER, INTERIM_SUFFIX)
}

pub fn is_inactive_name(prefix: &str, name: &str) -> bool {
    parse_release_name(prefix, name) == Some(ReleaseName::Inactive)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_release_names() {
        assert_eq!(parse_release_name("svc", "svc"), Some(ReleaseName::Canonical));
        assert_eq!(parse_release_name("svc", "svc__7"), Some(ReleaseName::Revision(7)));
        assert_eq!(parse_release_name("svc", "svc__INACTIVE"), Some(ReleaseName::Inactive));
        assert_eq!(parse_release_name("svc", "svc__inactive"), Some(ReleaseName::Inactive));
        assert_eq!(parse_release_name("svc", "svc__interim"), Some(ReleaseName::Interim));
    }

    #[test]
    fn test_non_members_are_rejected() {
        assert_eq!(parse_release_name("svc", "svc-api__1"), None);
        assert_eq!(parse_release_name("svc", "svc__blue"), None);
        assert_eq!(parse_release_name("svc", "svc__1__2"), None);
        assert_eq!(parse_release_name("svc", "svc__"), None);
        assert_eq!(parse_release_name("svc", "other__1"), None);
    }

    #[test]
    fn test_revision_of_uses_last_delimiter() {
        assert_eq!(revision_of("a_s_e__5"), Some(5));
        assert_eq!(revision_of("svc__INACTIVE"), None);
        assert_eq!(revision_of("svc"), None);
    }

    #[test]
    fn test_next_revision() {
        assert_eq!(next_revision(None), 0);
        assert_eq!(next_revision(Some(4)), 5);
    }

    #[test]
    fn test_name_builders() {
        assert_eq!(versioned_name("svc", 3), "svc__3");
        assert_eq!(inactive_name("svc"), "svc__INACTIVE");
        assert_eq!(interim_name("svc"), "svc__interim");
        assert!(is_inactive_name("svc", &inactive_name("svc")));
    }

    #[test]
    fn test_inactive_outranks_revisions() {
        assert!(ReleaseName::Inactive.rank() > ReleaseName::Revision(u32::MAX).rank());
        assert!(ReleaseName::Revision(0).rank() > ReleaseName::Canonical.rank());
    }
}
