//! String helpers. Lengths and truncation count `char`s, never bytes.

/// Whether `s` is empty or whitespace only.
#[must_use]
pub fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Trim and lowercase.
#[must_use]
pub fn trim_and_lower(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Trim and uppercase.
#[must_use]
pub fn trim_and_upper(s: &str) -> String {
    s.trim().to_uppercase()
}

/// Case-insensitive membership test.
#[must_use]
pub fn contains_ignore_case(items: &[String], item: &str) -> bool {
    let needle = item.to_lowercase();
    items.iter().any(|candidate| candidate.to_lowercase() == needle)
}

/// Split on `sep`, trimming each part and dropping empty ones.
#[must_use]
pub fn split_and_trim(s: &str, sep: &str) -> Vec<String> {
    s.split(sep)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Join the non-blank parts, trimmed, with `sep`.
#[must_use]
pub fn join_non_empty(parts: &[&str], sep: &str) -> String {
    parts
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Keep at most `max_chars` characters.
#[must_use]
pub fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Truncate to `max_chars`, replacing the tail with `...` when anything was
/// cut and there is room for it.
#[must_use]
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_owned();
    }
    if max_chars <= 3 {
        return truncate(s, max_chars);
    }
    let mut out = truncate(s, max_chars - 3);
    out.push_str("...");
    out
}

/// Uppercase the first character.
#[must_use]
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn words(s: &str) -> impl Iterator<Item = &str> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
}

/// `hello world` becomes `helloWorld`.
#[must_use]
pub fn camel_case(s: &str) -> String {
    let mut out = String::new();
    for (index, word) in words(s).enumerate() {
        let lower = word.to_lowercase();
        if index == 0 {
            out.push_str(&lower);
        } else {
            out.push_str(&capitalize(&lower));
        }
    }
    out
}

/// `hello world` becomes `HelloWorld`.
#[must_use]
pub fn pascal_case(s: &str) -> String {
    words(s).map(|word| capitalize(&word.to_lowercase())).collect()
}

fn delimited(s: &str, delimiter: char) -> String {
    let mut lowered = String::with_capacity(s.len());
    for (index, c) in s.chars().enumerate() {
        if index > 0 && c.is_uppercase() {
            lowered.push(delimiter);
        }
        lowered.extend(c.to_lowercase());
    }
    let mut out = String::with_capacity(lowered.len());
    let mut pending = false;
    for c in lowered.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending && !out.is_empty() {
                out.push(delimiter);
            }
            pending = false;
            out.push(c);
        } else {
            pending = true;
        }
    }
    out
}

/// `HelloWorld` or `hello world` becomes `hello_world`.
#[must_use]
pub fn snake_case(s: &str) -> String {
    delimited(s, '_')
}

/// `HelloWorld` or `hello world` becomes `hello-world`.
#[must_use]
pub fn kebab_case(s: &str) -> String {
    delimited(s, '-')
}

/// URL-friendly slug: lowercase ASCII letters and digits joined by single
/// hyphens.
#[must_use]
pub fn slugify(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut pending = false;
    for c in lower.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending && !out.is_empty() {
                out.push('-');
            }
            pending = false;
            out.push(c);
        } else {
            pending = true;
        }
    }
    out
}

/// Keep ASCII letters, digits and whitespace.
#[must_use]
pub fn remove_special_chars(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect()
}

/// Keep ASCII letters and digits.
#[must_use]
pub fn remove_non_alphanumeric(s: &str) -> String {
    s.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// Reverse by `char`.
#[must_use]
pub fn reverse(s: &str) -> String {
    s.chars().rev().collect()
}

/// Pad with spaces on the right up to `width` characters.
#[must_use]
pub fn pad_right(s: &str, width: usize) -> String {
    let missing = width.saturating_sub(s.chars().count());
    format!("{s}{}", " ".repeat(missing))
}

/// Pad with spaces on the left up to `width` characters.
#[must_use]
pub fn pad_left(s: &str, width: usize) -> String {
    let missing = width.saturating_sub(s.chars().count());
    format!("{}{s}", " ".repeat(missing))
}

/// Centre within `width` characters; odd padding goes to the right.
#[must_use]
pub fn pad_center(s: &str, width: usize) -> String {
    let missing = width.saturating_sub(s.chars().count());
    let left = missing / 2;
    format!("{}{s}{}", " ".repeat(left), " ".repeat(missing - left))
}

/// Number of whitespace-separated words.
#[must_use]
pub fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

/// Number of non-whitespace characters.
#[must_use]
pub fn char_count(s: &str) -> usize {
    s.chars().filter(|c| !c.is_whitespace()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", true)]
    #[case(" \t\n", true)]
    #[case(" a ", false)]
    fn blank_detection(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(is_blank(input), expected);
    }

    #[rstest]
    fn truncation_is_char_safe() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate_with_ellipsis("hello world", 8), "hello...");
        assert_eq!(truncate_with_ellipsis("hello", 3), "hel");
        assert_eq!(truncate_with_ellipsis("hi", 8), "hi");
    }

    #[rstest]
    #[case("hello world", "helloWorld", "HelloWorld")]
    #[case("user_id", "userId", "UserId")]
    #[case("  ", "", "")]
    fn camel_and_pascal(#[case] input: &str, #[case] camel: &str, #[case] pascal: &str) {
        assert_eq!(camel_case(input), camel);
        assert_eq!(pascal_case(input), pascal);
    }

    #[rstest]
    #[case("HelloWorld", "hello_world", "hello-world")]
    #[case("hello world", "hello_world", "hello-world")]
    #[case("  Leading Space", "leading_space", "leading-space")]
    #[case("userID", "user_i_d", "user-i-d")]
    fn snake_and_kebab(#[case] input: &str, #[case] snake: &str, #[case] kebab: &str) {
        assert_eq!(snake_case(input), snake);
        assert_eq!(kebab_case(input), kebab);
    }

    #[rstest]
    #[case("Hello, World!", "hello-world")]
    #[case("--Rust   is fun--", "rust-is-fun")]
    #[case("", "")]
    fn slugs(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(slugify(input), expected);
    }

    #[rstest]
    fn padding() {
        assert_eq!(pad_right("ab", 4), "ab  ");
        assert_eq!(pad_left("ab", 4), "  ab");
        assert_eq!(pad_center("ab", 5), " ab  ");
        assert_eq!(pad_center("abcdef", 3), "abcdef");
    }

    #[rstest]
    fn counting() {
        assert_eq!(word_count("  one two\tthree "), 3);
        assert_eq!(char_count("a b c"), 3);
        assert_eq!(reverse("abc"), "cba");
        assert_eq!(capitalize("élan"), "Élan");
    }

    #[rstest]
    fn joining_and_splitting() {
        assert_eq!(join_non_empty(&[" a", "", " ", "b "], ","), "a,b");
        assert_eq!(split_and_trim("a, b,,c ", ","), vec!["a", "b", "c"]);
        let items = vec!["Alpha".to_owned()];
        assert!(contains_ignore_case(&items, "ALPHA"));
    }
}
