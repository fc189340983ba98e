//! Version strings and byte-size formatting

/// Version used when there is nothing valid to increment from
pub const INITIAL_VERSION: &str = "0.0.1";

const BYTE_UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

fn components(version: &str) -> Option<[&str; 3]> {
    let mut parts = version.trim().split('.');
    let components = [parts.next()?, parts.next()?, parts.next()?];
    if parts.next().is_some() || !components.iter().all(|c| is_digits(c)) {
        return None;
    }
    Some(components)
}

fn is_digits(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())
}

/// True iff the trimmed input is exactly `MAJOR.MINOR.PATCH` of decimal digits.
///
/// Components of any length are accepted; only the bump needs them numeric.
pub fn is_valid_version(version: &str) -> bool {
    components(version).is_some()
}

/// Same major.minor with the patch bumped, or `0.0.1` for invalid input.
///
/// Leading zeros are dropped, as an integer parse would.
pub fn next_patch_version(version: &str) -> String {
    match components(version) {
        Some([major, minor, patch]) => format!(
            "{}.{}.{}",
            strip_zeros(major),
            strip_zeros(minor),
            increment(strip_zeros(patch))
        ),
        None => INITIAL_VERSION.to_string(),
    }
}

fn strip_zeros(digits: &str) -> &str {
    match digits.trim_start_matches('0') {
        "" => "0",
        rest => rest,
    }
}

/// Add one to a run of decimal digits
fn increment(digits: &str) -> String {
    let mut bytes = digits.as_bytes().to_vec();
    for b in bytes.iter_mut().rev() {
        if *b == b'9' {
            *b = b'0';
        } else {
            *b += 1;
            return String::from_utf8_lossy(&bytes).into_owned();
        }
    }
    format!("1{}", String::from_utf8_lossy(&bytes))
}

/// Human readable size, scaling up to TiB with one decimal place
pub fn format_bytes(size: f64) -> String {
    if !size.is_finite() || size < 0.0 {
        return "-".to_string();
    }
    if size < 1024.0 {
        return format!("{} B", size);
    }

    let mut value = size / 1024.0;
    let mut idx = 0;
    while value >= 1024.0 && idx < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        idx += 1;
    }
    format!("{:.1} {}", value, BYTE_UNITS[idx])
}
