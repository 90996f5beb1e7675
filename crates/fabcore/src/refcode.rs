//! Генерация реферальных кодов.
//!
//! Codes tag provisioned bots and users for attribution. Collision checks
//! against persisted bots are the provisioning side's responsibility; this
//! module only guarantees charset, length and uniform randomness, and never
//! touches I/O.

use rand::RngExt;

use crate::config::refcode::{CHARSET, LENGTH};

/// Случайный код: 8 символов из `[A-Z0-9]`
pub fn generate() -> String {
    let mut rng = rand::rng();
    (0..LENGTH)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

/// Детерминированный код из строки-источника (например, идентификатора
/// процесса или телефона) — фолбэк, когда явный код не запрошен, а
/// случайность нежелательна.
pub fn derive(seed: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut out = String::with_capacity(LENGTH);
    let mut counter: u64 = 0;
    while out.len() < LENGTH {
        let mut hasher = DefaultHasher::new();
        seed.hash(&mut hasher);
        counter.hash(&mut hasher);
        let mut hash = hasher.finish();
        // Each 64-bit hash yields 8 charset indices; one round is enough
        // for LENGTH = 8, the loop guards against future length bumps.
        while hash > 0 && out.len() < LENGTH {
            out.push(CHARSET[(hash % CHARSET.len() as u64) as usize] as char);
            hash /= CHARSET.len() as u64;
        }
        counter += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_codes_match_charset_and_length() {
        for _ in 0..10_000 {
            let code = generate();
            assert_eq!(code.len(), LENGTH);
            assert!(
                code.bytes().all(|b| CHARSET.contains(&b)),
                "code {code} leaves the charset"
            );
        }
    }

    #[test]
    fn test_generated_codes_do_not_collide_in_sample() {
        // 36^8 ≈ 2.8e12 possible codes; 10k draws colliding would mean the
        // generator is badly skewed, not bad luck.
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(generate()), "collision within 10k sample");
        }
    }

    #[test]
    fn test_derive_is_deterministic() {
        let a = derive("worker-7");
        let b = derive("worker-7");
        assert_eq!(a, b);
        assert_eq!(a.len(), LENGTH);
        assert!(a.bytes().all(|b| CHARSET.contains(&b)));
    }

    #[test]
    fn test_derive_differs_per_seed() {
        assert_ne!(derive("worker-7"), derive("worker-8"));
    }
}
