use semver::Version;

/// Parse a version the way mod authors write them.
///
/// Accepts full semantic versions plus the short forms `1` and `1.2`
/// (missing components are zero), with or without a leading `v`.
pub fn parse_lenient(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(version) = Version::parse(trimmed) {
        return Some(version);
    }

    // Split off any pre-release / build suffix before padding the core.
    let split_at = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split_at);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);
    Version::parse(&padded).ok()
}

/// Host API version compatibility for a mod library: same major, and the
/// library must not be built against a newer minor than the host provides.
pub fn is_api_compatible(host: &Version, built_against: &Version) -> bool {
    host.major == built_against.major && built_against.minor <= host.minor
}
