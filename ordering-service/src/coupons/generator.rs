//! Random coupon codes.

use rand::Rng;

pub const GENERATED_CODE_LENGTH: usize = 7;

const ALPHABET: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Seven uppercase letters drawn uniformly from A-Z.
///
/// Uniqueness is not guaranteed; see `CouponAdmin::generate_unique_code`.
pub fn generate_code() -> String {
    generate_code_with(&mut rand::thread_rng())
}

pub fn generate_code_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..GENERATED_CODE_LENGTH)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupons::format::validate_code_format;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    #[test]
    fn always_seven_uppercase_letters() {
        for _ in 0..1_000 {
            let code = generate_code();
            assert_eq!(code.len(), GENERATED_CODE_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_uppercase()), "{code}");
            assert_eq!(validate_code_format(&code), Ok(()));
        }
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        let a = generate_code_with(&mut StdRng::seed_from_u64(7));
        let b = generate_code_with(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn every_letter_shows_up() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts: HashMap<char, usize> = HashMap::new();
        for _ in 0..2_000 {
            for c in generate_code_with(&mut rng).chars() {
                *counts.entry(c).or_default() += 1;
            }
        }

        // 14_000 draws over 26 letters: ~538 each.
        assert_eq!(counts.len(), 26);
        for (letter, count) in counts {
            assert!((300..800).contains(&count), "{letter} drawn {count} times");
        }
    }
}
