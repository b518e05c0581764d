use rand::{Rng, distributions::Uniform};

const UPPER_ALNUM: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const LOWER_ALNUM: &[u8] = b"abcdefghijkmnpqrstuvwxyz23456789";

/// Affiliate code: `BM` followed by six upper-case characters. Visually
/// ambiguous characters (0/O, 1/I/L) are excluded.
pub fn affiliate_code() -> String {
    format!("BM{}", random_from(UPPER_ALNUM, 6))
}

/// Ten lower-case characters embedded in shared URLs as `?ref=`.
pub fn tracking_code() -> String {
    random_from(LOWER_ALNUM, 10)
}

fn random_from(alphabet: &[u8], len: usize) -> String {
    let mut rng = rand::thread_rng();
    let dist = Uniform::from(0..alphabet.len());
    (0..len)
        .map(|_| alphabet[rng.sample(dist)] as char)
        .collect()
}

/// Tracking codes accepted from the outside world.
pub fn is_valid_tracking_code(code: &str) -> bool {
    (4..=32).contains(&code.len())
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affiliate_code_shape() {
        let code = affiliate_code();
        assert_eq!(code.len(), 8);
        assert!(code.starts_with("BM"));
        assert!(code[2..].bytes().all(|b| UPPER_ALNUM.contains(&b)));
    }

    #[test]
    fn test_tracking_code_shape() {
        let code = tracking_code();
        assert_eq!(code.len(), 10);
        assert!(code.bytes().all(|b| LOWER_ALNUM.contains(&b)));
        assert!(is_valid_tracking_code(&code));
    }

    #[test]
    fn test_rejects_odd_tracking_codes() {
        assert!(!is_valid_tracking_code("abc"));
        assert!(!is_valid_tracking_code("abc def ghi"));
        assert!(!is_valid_tracking_code("<script>"));
    }
}
