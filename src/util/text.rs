/// Normalizes a single-line label such as a feed or post title.
///
/// Collapses runs of whitespace (including newlines) into single spaces,
/// trims both ends and drops control characters.
///
/// # Examples
///
/// ```
/// use blogroll::util::normalize_title;
///
/// assert_eq!(normalize_title("  Hello\n\t World  "), "Hello World");
/// assert_eq!(normalize_title("Bell\u{7}"), "Bell");
/// ```
pub fn normalize_title(s: &str) -> String {
    s.split_whitespace()
        .map(|word| word.chars().filter(|c| !c.is_control()).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
