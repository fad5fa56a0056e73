//! Referral code generation and link building

use crate::error::{Error, Result};
use rand::Rng;

/// Characters allowed in referral codes
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Shortest allowed code
pub const MIN_CODE_LEN: usize = 8;

/// Longest allowed code
pub const MAX_CODE_LEN: usize = 12;

/// Generate a referral code of `len` uppercase alphanumeric characters.
///
/// Codes match `^[A-Z0-9]{8,12}$`; uniqueness is enforced by the caller
/// against storage, not here.
pub fn generate_code(len: usize) -> Result<String> {
    if !(MIN_CODE_LEN..=MAX_CODE_LEN).contains(&len) {
        return Err(Error::InvalidInput(format!(
            "referral code length {} outside {}..={}",
            len, MIN_CODE_LEN, MAX_CODE_LEN
        )));
    }

    let mut rng = rand::thread_rng();
    let code = (0..len)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    Ok(code)
}

/// Check a candidate code against the referral code grammar
pub fn is_valid_code(code: &str) -> bool {
    (MIN_CODE_LEN..=MAX_CODE_LEN).contains(&code.len())
        && code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

/// Build the shareable signup link for a code
pub fn referral_link(base_url: &str, code: &str) -> String {
    format!("{}/join?ref={}", base_url.trim_end_matches('/'), code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_codes_match_grammar() {
        for len in MIN_CODE_LEN..=MAX_CODE_LEN {
            let code = generate_code(len).unwrap();
            assert_eq!(code.len(), len);
            assert!(is_valid_code(&code), "bad code: {}", code);
        }
    }

    #[test]
    fn test_rejects_out_of_range_length() {
        assert!(generate_code(7).is_err());
        assert!(generate_code(13).is_err());
    }

    #[test]
    fn test_codes_unique_across_many_generations() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let code = generate_code(10).unwrap();
            assert!(seen.insert(code), "duplicate code generated");
        }
    }

    #[test]
    fn test_code_grammar() {
        assert!(is_valid_code("A1B2C3D4"));
        assert!(is_valid_code("ZZZZ99990000"));
        assert!(!is_valid_code("short"));
        assert!(!is_valid_code("lowercase99"));
        assert!(!is_valid_code("WAY-TOO-LONG-CODE"));
    }

    #[test]
    fn test_referral_link_embeds_code() {
        let link = referral_link("https://aquastake.example/", "A1B2C3D4");
        assert_eq!(link, "https://aquastake.example/join?ref=A1B2C3D4");
    }
}
