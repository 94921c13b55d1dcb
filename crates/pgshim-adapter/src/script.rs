//! Script splitting for `execute_script`.

/// Split `script` on `;` into trimmed, non-empty statements.
///
/// The split is purely textual: semicolons inside string literals or
/// dollar-quoted bodies also split.
pub fn split_script(script: &str) -> Vec<&str> {
    script
        .split(';')
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
        .collect()
}
