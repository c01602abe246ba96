//! Significance of the number of common hashes between two sketches.
//!
//! Under the null model two sequences of lengths la and lb share a kmer at random with probability
//! derived from the kmer space. Observing x common hashes out of denom is then a binomial tail
//! P[X >= x], X ~ B(denom, r).
//!
//! The tail is computed with the regularized incomplete beta function :
//! P[X >= x] = I_r(x, n - x + 1).


/// A model giving the probability of observing at least `common` shared hashes by chance.
pub trait SignificanceModel : Send + Sync {
    fn pvalue(&self, common : u64, length_a : u64, length_b : u64, kmer_space : f64, denom : u64) -> f64;
}


/// Binomial right tail model.
#[derive(Copy, Clone, Debug, Default)]
pub struct BinomialTail;


impl SignificanceModel for BinomialTail {

    fn pvalue(&self, common : u64, length_a : u64, length_b : u64, kmer_space : f64, denom : u64) -> f64 {
        if common == 0 {
            return 1.;
        }
        let px = random_kmer_chance(length_a, kmer_space);
        let py = random_kmer_chance(length_b, kmer_space);
        let union = px + py - px * py;
        if union <= 0. {
            // a null length, no random match possible
            return 0.;
        }
        let r = px * py / union;
        binomial_survival(common, denom, r)
    }
} // end of impl BinomialTail



/// probability that a kmer is present at random in a sequence of length `length`
#[inline]
pub fn random_kmer_chance(length : u64, kmer_space : f64) -> f64 {
    if length == 0 {
        return 0.;
    }
    1. / (1. + kmer_space / length as f64)
}


/// P[X >= x] for X ~ B(n, p)
pub fn binomial_survival(x : u64, n : u64, p : f64) -> f64 {
    if x == 0 {
        return 1.;
    }
    if x > n || p <= 0. {
        return 0.;
    }
    if p >= 1. {
        return 1.;
    }
    let res = regularized_incomplete_beta(x as f64, (n - x + 1) as f64, p);
    res.clamp(0., 1.)
}



const LANCZOS_G : f64 = 7.;

const LANCZOS_COEF : [f64; 9] = [
    0.999_999_999_999_809_93,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_13,
    -176.615_029_162_140_59,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_571_6e-6,
    1.505_632_735_149_311_6e-7,
];


/// log of gamma function, Lanczos approximation. Requires x > 0
pub fn ln_gamma(x : f64) -> f64 {
    if x < 0.5 {
        // reflection
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1. - x);
    }
    let x = x - 1.;
    let mut a = LANCZOS_COEF[0];
    let t = x + LANCZOS_G + 0.5;
    for (i, c) in LANCZOS_COEF.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }
    0.5 * (2. * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}



/// I_x(a,b), continued fraction evaluated with modified Lentz method.
pub fn regularized_incomplete_beta(a : f64, b : f64, x : f64) -> f64 {
    if x <= 0. {
        return 0.;
    }
    if x >= 1. {
        return 1.;
    }
    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1. - x).ln();
    let front = ln_front.exp();
    // the continued fraction converges fast for x < (a+1)/(a+b+2), otherwise use symmetry
    if x < (a + 1.) / (a + b + 2.) {
        front * beta_continued_fraction(a, b, x) / a
    }
    else {
        1. - front * beta_continued_fraction(b, a, 1. - x) / b
    }
}


const CF_MAX_ITER : usize = 500;
const CF_EPSILON : f64 = 1.0e-15;
const CF_TINY : f64 = 1.0e-300;

fn beta_continued_fraction(a : f64, b : f64, x : f64) -> f64 {
    let qab = a + b;
    let qap = a + 1.;
    let qam = a - 1.;
    let mut c = 1.;
    let mut d = 1. - qab * x / qap;
    if d.abs() < CF_TINY {
        d = CF_TINY;
    }
    d = 1. / d;
    let mut h = d;
    for m in 1..=CF_MAX_ITER {
        let m = m as f64;
        let m2 = 2. * m;
        // even step
        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1. + aa * d;
        if d.abs() < CF_TINY {
            d = CF_TINY;
        }
        c = 1. + aa / c;
        if c.abs() < CF_TINY {
            c = CF_TINY;
        }
        d = 1. / d;
        h *= d * c;
        // odd step
        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1. + aa * d;
        if d.abs() < CF_TINY {
            d = CF_TINY;
        }
        c = 1. + aa / c;
        if c.abs() < CF_TINY {
            c = CF_TINY;
        }
        d = 1. / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.).abs() < CF_EPSILON {
            break;
        }
    }
    h
} // end of beta_continued_fraction



#[cfg(test)]
mod tests {

    use super::*;

    // direct summation of binomial probabilities
    fn survival_by_sum(x : u64, n : u64, p : f64) -> f64 {
        let mut sum = 0.;
        for k in x..=n {
            let ln_binom = ln_gamma((n + 1) as f64) - ln_gamma((k + 1) as f64) - ln_gamma((n - k + 1) as f64);
            sum += (ln_binom + k as f64 * p.ln() + (n - k) as f64 * (1. - p).ln()).exp();
        }
        sum
    }

    #[test]
    fn test_ln_gamma() {
        // gamma(5) = 24, gamma(0.5) = sqrt(pi)
        assert!((ln_gamma(5.) - 24f64.ln()).abs() < 1.0e-10);
        assert!((ln_gamma(0.5) - std::f64::consts::PI.sqrt().ln()).abs() < 1.0e-10);
        assert!((ln_gamma(1.)).abs() < 1.0e-10);
    }

    #[test]
    fn test_binomial_survival() {
        // P[X >= 1] for B(1, p) is p
        assert!((binomial_survival(1, 1, 0.3) - 0.3).abs() < 1.0e-10);
        // P[X >= 2] for B(3, 0.5) = 4/8
        assert!((binomial_survival(2, 3, 0.5) - 0.5).abs() < 1.0e-10);
        for &(x, n, p) in &[(3u64, 10u64, 0.2f64), (7, 10, 0.2), (50, 400, 0.1), (1, 400, 0.001), (399, 400, 0.9)] {
            let direct = survival_by_sum(x, n, p);
            let beta = binomial_survival(x, n, p);
            log::debug!("x {} n {} p {} direct {:.6e} beta {:.6e}", x, n, p, direct, beta);
            assert!((direct - beta).abs() <= 1.0e-9 * direct.max(1.0e-300) + 1.0e-14);
        }
    }

    #[test]
    fn test_survival_edges() {
        assert_eq!(binomial_survival(0, 10, 0.5), 1.);
        assert_eq!(binomial_survival(11, 10, 0.5), 0.);
        assert_eq!(binomial_survival(3, 10, 0.), 0.);
        assert_eq!(binomial_survival(3, 10, 1.), 1.);
    }

    #[test]
    fn test_pvalue_model() {
        let model = BinomialTail;
        assert_eq!(model.pvalue(0, 1000, 1000, 1.0e6, 100), 1.);
        // a null length cannot produce random matches
        assert_eq!(model.pvalue(3, 0, 1000, 1.0e6, 100), 0.);
        // more common hashes is less probable at random
        let p_few = model.pvalue(2, 1000, 1000, 1.0e6, 100);
        let p_many = model.pvalue(20, 1000, 1000, 1.0e6, 100);
        assert!(p_many < p_few);
        assert!(p_few <= 1. && p_many >= 0.);
    }

} // end of mod tests
