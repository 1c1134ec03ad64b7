/// Logical name used when the caller does not ask for a specific database.
pub const DEFAULT_DB_NAME: &str = "testdb";

/// Turns an arbitrary test identifier into something that is valid both as a
/// file name component and as an SQL database name.
///
/// The result always matches `^[a-z0-9_-]{0,64}$`. An empty result is legal;
/// backends substitute [`DEFAULT_DB_NAME`] for it. Mixed separator sequences
/// on the edges are trimmed in a single pass, so a name like `"./a/."` relies
/// on the inner removal step rather than repeated trimming.
pub fn normalize_db_name(name: &str) -> String {
    let truncated: String = name.chars().take(64).collect();
    let trimmed = truncated.trim_matches(['/', '\\', '.']);
    let no_separators: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '.'))
        .collect();
    let no_spaces = no_separators.replace(' ', "");
    let no_edge_dashes = no_spaces.trim_matches('-');
    let clean: String = no_edge_dashes
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        .collect();
    return clean.to_lowercase();
}
