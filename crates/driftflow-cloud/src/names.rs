//! Helpers for resource names and self links

/// Short name of a resource reference.
///
/// `https://compute.googleapis.com/compute/v1/projects/p/zones/us-central1-a`
/// and `projects/p/zones/us-central1-a` both yield `us-central1-a`; a value
/// without `/` is returned unchanged.
pub fn resource_name_from_self_link(reference: &str) -> &str {
    match reference.rfind('/') {
        Some(idx) => &reference[idx + 1..],
        None => reference,
    }
}

/// Whether `value` is a decimal 64-bit integer (a numeric id such as a
/// project number)
pub fn is_fixed64(value: &str) -> bool {
    !value.is_empty() && value.parse::<i64>().is_ok()
}
