/// Typeahead candidates: prefix matches first, then substring matches, both in
/// store order.
pub fn suggest(names: &[String], input: &str, limit: usize) -> Vec<String> {
    let needle = input.trim().to_lowercase();
    if needle.is_empty() || limit == 0 {
        return Vec::new();
    }
    let mut prefix = Vec::new();
    let mut contains = Vec::new();
    for name in names {
        let lower = name.to_lowercase();
        if lower.starts_with(&needle) {
            prefix.push(name.clone());
            if prefix.len() >= limit {
                break;
            }
        } else if contains.len() < limit && lower.contains(&needle) {
            contains.push(name.clone());
        }
    }
    prefix.extend(contains);
    prefix.truncate(limit);
    prefix
}
