// Project slug normalisation.

/// Turn a free-form name into a URL-safe slug: lower-case ASCII letters and
/// digits, every other run of characters collapsed into a single `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_collapses_separators() {
        assert_eq!(slugify("My Site"), "my-site");
        assert_eq!(slugify("My   Cool__Site!!"), "my-cool-site");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
    }

    #[test]
    fn trims_leading_and_trailing_separators() {
        assert_eq!(slugify("  --portfolio 2024-- "), "portfolio-2024");
    }

    #[test]
    fn drops_non_ascii() {
        assert_eq!(slugify("café déjà"), "caf-d-j");
        assert_eq!(slugify("???"), "");
    }
}
