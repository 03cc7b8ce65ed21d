//! Tag name normalization.

/// Convert a wire tag name to the lower-with-underscores field convention.
///
/// Word boundaries are inserted between a lowercase letter or digit and an
/// uppercase letter, and before the last capital of an acronym run that is
/// followed by a lowercase letter. Dashes become underscores.
///
/// ```
/// use aws_query_xml::underscore;
///
/// assert_eq!(underscore("DescribeDBInstancesResult"), "describe_db_instances_result");
/// assert_eq!(underscore("requestId"), "request_id");
/// assert_eq!(underscore("IPRanges"), "ip_ranges");
/// ```
pub fn underscore(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 8);

    for (i, &ch) in chars.iter().enumerate() {
        if ch == '-' {
            out.push('_');
            continue;
        }

        if ch.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|c| c.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower);
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
        }

        out.extend(ch.to_lowercase());
    }

    out
}
