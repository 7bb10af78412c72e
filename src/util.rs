use std::time::{SystemTime, UNIX_EPOCH};

/// The current local time, in a human-readable form.
pub fn time_str() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// The current time as a Unix timestamp.
pub fn time_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Truncates `s` to at most `max` bytes, on a character boundary.
pub fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Whether `target` matches the IRC wildcard `mask`.
///
/// `*` matches any run of characters, `?` matches exactly one.  Matching is
/// ASCII case-insensitive, since masks name nicks and hosts.
pub fn mask_matches(mask: &str, target: &str) -> bool {
    let mask = mask.as_bytes();
    let target = target.as_bytes();
    let (mut m, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < target.len() {
        if m < mask.len() && (mask[m] == b'?' || mask[m].eq_ignore_ascii_case(&target[t])) {
            m += 1;
            t += 1;
        } else if m < mask.len() && mask[m] == b'*' {
            backtrack = Some((m, t));
            m += 1;
        } else if let Some((sm, st)) = backtrack {
            m = sm + 1;
            t = st + 1;
            backtrack = Some((sm, st + 1));
        } else {
            return false;
        }
    }
    while m < mask.len() && mask[m] == b'*' {
        m += 1;
    }
    m == mask.len()
}
