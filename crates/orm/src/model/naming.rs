//! Naming conventions shared by table-name derivation and column guessing

/// `UserAccount` → `user_account`, `HTTPRequest` → `http_request`
pub fn camel_to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1);
            let boundary = match prev {
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.map_or(false, |n| n.is_ascii_lowercase()),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Table name derived from a type name: snake case plus a trailing `s`
pub fn derive_table_name(type_name: &str) -> String {
    let mut table = camel_to_snake(type_name);
    if !table.is_empty() {
        table.push('s');
    }
    table
}

/// Last path segment of a Rust type name, without generic arguments
pub fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Loose identity used when a column has no explicit field tag: case and
/// underscores are ignored, so `created_at`, `createdAt` and `CreatedAt` meet
pub fn guess_key(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
