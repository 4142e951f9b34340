//! URL slugs for posts, categories and tags.

/// Longest slug produced here; leaves room for a `-<id>` suffix in the
/// 250-character column.
pub const MAX_SLUG_LEN: usize = 200;

/// Lowercase ASCII slug with words joined by `-`.
///
/// Non-ASCII letters are transliterated (`Café` becomes `cafe`). Titles with
/// nothing transliterable yield an empty string.
pub fn slugify(input: &str) -> String {
    let slug = slug::slugify(input);
    if slug.len() <= MAX_SLUG_LEN {
        return slug;
    }

    // Output is ASCII, so any byte index is a char boundary.
    slug[..MAX_SLUG_LEN].trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_titles() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  Rust 2024 -- edition  "), "rust-2024-edition");
        assert_eq!(slugify("___"), "");
    }

    #[test]
    fn accented_latin_is_transliterated() {
        assert_eq!(slugify("Café Crème"), "cafe-creme");
        assert_eq!(slugify("Straße über Köln"), "strasse-uber-koln");
    }

    #[test]
    fn cyrillic_is_transliterated() {
        let slug = slugify("Новый пост");
        assert!(!slug.is_empty());
        assert!(slug.is_ascii());
        assert!(slug.ends_with("post"));
    }

    #[test]
    fn long_titles_are_truncated() {
        let slug = slugify(&"word ".repeat(100));
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }
}
