//! Property tests for the arithmetic laws the planner leans on.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use num_bigint::BigInt;
use num_traits::Signed;
use proptest::prelude::*;
use rational::{
    factor_splitting, factorize, fract_lcm, freq, is_multiple_of,
    limit_denominator, Freq,
};

fn small_fraction() -> impl Strategy<Value = Freq> {
    (1i64..=10_000, 1i64..=10_000).prop_map(|(n, d)| freq(n, d))
}

proptest! {
    /// The rational lcm is a common multiple, is symmetric, and absorbs
    /// its own arguments.
    #[test]
    fn lcm_laws(a in small_fraction(), b in small_fraction()) {
        let l = fract_lcm(&a, &b);
        prop_assert!(is_multiple_of(&l, &a));
        prop_assert!(is_multiple_of(&l, &b));
        prop_assert_eq!(&l, &fract_lcm(&b, &a));
        prop_assert_eq!(&l, &fract_lcm(&l, &a));
    }

    /// Every two-way split of n within the bounds appears exactly once.
    #[test]
    fn factor_splitting_is_exact_and_complete(
        n in 1u64..=100_000,
        max_l in 1u64..=100_000,
        max_r in 1u64..=100_000,
    ) {
        let primes = factorize(n);
        let mut got: Vec<(u64, u64)> =
            factor_splitting(n, &primes, max_l, max_r).collect();
        got.sort_unstable();
        let mut want = Vec::new();
        for l in 1..=n {
            if l * l > n {
                break;
            }
            if n % l == 0 {
                let r = n / l;
                if l <= max_l && r <= max_r {
                    want.push((l, r));
                }
                if l != r && r <= max_l && l <= max_r {
                    want.push((r, l));
                }
            }
        }
        want.sort_unstable();
        prop_assert_eq!(got, want);
    }

    /// Factorisation returns exactly the distinct primes of n, sorted.
    #[test]
    fn factorize_covers(n in 1u64..=10_000_000) {
        let factors = factorize(n);
        let mut left = n;
        for &p in &factors {
            prop_assert_eq!(left % p, 0);
            while left % p == 0 {
                left /= p;
            }
        }
        prop_assert_eq!(left, 1);
        prop_assert!(factors.windows(2).all(|w| w[0] < w[1]));
    }

    /// The bounded approximation respects its bound and never does worse
    /// than rounding against any denominator within the bound.
    #[test]
    fn limit_denominator_is_closest(
        n in 1i64..=1_000_000,
        d in 1i64..=1_000_000,
        bound in 1i64..=1000,
    ) {
        let x = freq(n, d);
        let approx = limit_denominator(&x, &BigInt::from(bound));
        prop_assert!(*approx.denom() <= BigInt::from(bound));
        let err = (&approx - &x).abs();
        for q in 1..=bound {
            // Round n·q/d to the nearest integer numerator.
            let nearest = (freq(n * q, d) + freq(1, 2)).floor();
            let candidate = nearest / freq(q, 1);
            prop_assert!(err <= (&candidate - &x).abs());
        }
    }
}
