use sha2::{Digest, Sha256};

/// Lowercase ASCII slug: runs of anything that is not a letter or digit
/// collapse into a single dash. Non-ASCII characters are dropped.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_ascii() {
            pending_dash = true;
        }
    }

    slug
}

/// Trim and cap a string at `max_chars` characters.
pub fn truncate_chars(input: &str, max_chars: usize) -> String {
    input.trim().chars().take(max_chars).collect()
}

/// Hex SHA-256 of `value`; used so raw client addresses never reach storage.
pub fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Harambee Stars beat Cranes 2-1!"), "harambee-stars-beat-cranes-2-1");
        assert_eq!(slugify("  CHAN 2024: Kenya's bid  "), "chan-2024-kenya-s-bid");
        assert_eq!(slugify("Café Gor Mahia"), "caf-gor-mahia");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_sha256_hex_is_stable() {
        let a = sha256_hex("203.0.113.7");
        assert_eq!(a.len(), 64);
        assert_eq!(a, sha256_hex("203.0.113.7"));
        assert_ne!(a, sha256_hex("203.0.113.8"));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("  habari  ", 3), "hab");
    }
}
