// File: src/sampling.rs
// Temperature-controlled draws from the frequency table.

use crate::core::context::Context;
use crate::core::types::{Successors, Token};
use crate::error::{ChatError, Result};
use crate::store::FrequencyStore;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub fn validate_temperature(temperature: f64) -> Result<()> {
    if !temperature.is_finite() || temperature <= 0.0 {
        return Err(ChatError::InvalidTemperature(temperature));
    }
    Ok(())
}

/// Turns counts into probabilities `count / total`.
pub fn normalize(successors: &Successors) -> Vec<(Token, f64)> {
    let total: u64 = successors.values().sum();
    if total == 0 {
        return Vec::new();
    }
    successors
        .iter()
        .map(|(token, &count)| (token.clone(), count as f64 / total as f64))
        .collect()
}

/// Reshapes a distribution with `exp(ln(p) / temperature)` and renormalizes.
///
/// Temperatures below 1 sharpen toward the mode, above 1 flatten toward
/// uniform. The ranking of candidates is preserved. At exactly 1 the input
/// is returned unchanged.
pub fn apply_temperature(probs: &[f64], temperature: f64) -> Result<Vec<f64>> {
    validate_temperature(temperature)?;
    if temperature == 1.0 {
        return Ok(probs.to_vec());
    }

    // ln(0) is taken as -inf, so zero-probability candidates stay at zero.
    // Log-probs are shifted by their max before exponentiating so tiny
    // temperatures do not underflow every weight; the shift cancels out.
    let max = probs
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|p| p.ln())
        .fold(f64::NEG_INFINITY, f64::max);
    let tempered: Vec<f64> = probs
        .iter()
        .map(|&p| if p > 0.0 { ((p.ln() - max) / temperature).exp() } else { 0.0 })
        .collect();
    let sum: f64 = tempered.iter().sum();
    if sum <= 0.0 {
        return Ok(tempered);
    }
    Ok(tempered.into_iter().map(|t| t / sum).collect())
}

/// The tempered distribution the sampler draws from for `context`.
pub fn distribution<S>(store: &S, context: &Context, temperature: f64) -> Result<Vec<(Token, f64)>>
where
    S: FrequencyStore + ?Sized,
{
    validate_temperature(temperature)?;
    let successors = store
        .lookup(context)
        .ok_or_else(|| ChatError::UnknownContext(context.clone()))?;
    let (tokens, probs): (Vec<Token>, Vec<f64>) = normalize(successors).into_iter().unzip();
    let tempered = apply_temperature(&probs, temperature)?;
    Ok(tokens.into_iter().zip(tempered).collect())
}

/// Draws the next token after `context`.
///
/// Fails with `InvalidTemperature` before touching the store, and with
/// `UnknownContext` when the context was never observed.
pub fn sample<S, R>(store: &S, context: &Context, temperature: f64, rng: &mut R) -> Result<Token>
where
    S: FrequencyStore + ?Sized,
    R: Rng + ?Sized,
{
    let dist = distribution(store, context, temperature)?;
    let index = WeightedIndex::new(dist.iter().map(|(_, p)| *p))
        .map_err(|_| ChatError::UnknownContext(context.clone()))?;
    Ok(dist[index.sample(rng)].0.clone())
}

/// A sampler bound to one temperature and its own random source.
pub struct Sampler {
    temperature: f64,
    rng: StdRng,
}

impl Sampler {
    pub fn new(temperature: f64) -> Result<Self> {
        validate_temperature(temperature)?;
        Ok(Self {
            temperature,
            rng: StdRng::from_entropy(),
        })
    }

    /// Same draws for the same seed, for reproducible generations.
    pub fn with_seed(temperature: f64, seed: u64) -> Result<Self> {
        validate_temperature(temperature)?;
        Ok(Self {
            temperature,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn sample<S>(&mut self, store: &S, context: &Context) -> Result<Token>
    where
        S: FrequencyStore + ?Sized,
    {
        sample(store, context, self.temperature, &mut self.rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{QaPair, BOS};
    use crate::learning::Trainer;
    use crate::store::MemoryStore;

    const EPS: f64 = 1e-9;

    fn skewed() -> Successors {
        let mut s = Successors::new();
        s.insert("가".into(), 6);
        s.insert("나".into(), 3);
        s.insert("다".into(), 1);
        s
    }

    fn probs_of(s: &Successors) -> Vec<f64> {
        normalize(s).into_iter().map(|(_, p)| p).collect()
    }

    #[test]
    fn normalized_sums_to_one() {
        let probs = probs_of(&skewed());
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < EPS);
        assert!((probs[0] - 0.6).abs() < EPS);
    }

    #[test]
    fn tempered_sums_to_one() {
        let probs = probs_of(&skewed());
        for t in [0.1, 0.5, 0.8, 1.0, 1.5, 3.0, 50.0] {
            let tempered = apply_temperature(&probs, t).unwrap();
            assert!((tempered.iter().sum::<f64>() - 1.0).abs() < 1e-9, "t={t}");
        }
    }

    #[test]
    fn unit_temperature_is_identity() {
        let probs = probs_of(&skewed());
        assert_eq!(apply_temperature(&probs, 1.0).unwrap(), probs);
    }

    #[test]
    fn low_temperature_sharpens_high_flattens() {
        let probs = probs_of(&skewed());
        let cold = apply_temperature(&probs, 0.5).unwrap();
        let hot = apply_temperature(&probs, 2.0).unwrap();
        assert!(cold[0] > probs[0]);
        assert!(hot[0] < probs[0]);
        // ranking preserved
        for dist in [&cold, &hot] {
            assert!(dist[0] > dist[1] && dist[1] > dist[2]);
        }
        let very_hot = apply_temperature(&probs, 1e6).unwrap();
        for p in very_hot {
            assert!((p - 1.0 / 3.0).abs() < 1e-3);
        }
    }

    #[test]
    fn zero_probability_stays_zero() {
        let tempered = apply_temperature(&[0.0, 0.25, 0.75], 0.3).unwrap();
        assert_eq!(tempered[0], 0.0);
        assert!((tempered[1] + tempered[2] - 1.0).abs() < EPS);
    }

    #[test]
    fn non_positive_temperature_rejected() {
        for t in [0.0, -1.0, f64::NAN] {
            assert!(matches!(
                apply_temperature(&[1.0], t),
                Err(ChatError::InvalidTemperature(_))
            ));
            assert!(Sampler::new(t).is_err());
        }
    }

    #[test]
    fn invalid_temperature_reported_before_lookup() {
        let store = MemoryStore::new(1);
        let mut rng = StdRng::seed_from_u64(0);
        let err = sample(&store, &Context::new(["없음"]), 0.0, &mut rng).unwrap_err();
        assert!(matches!(err, ChatError::InvalidTemperature(_)));
    }

    #[test]
    fn unknown_context_is_reported() {
        let store = MemoryStore::new(1);
        let mut sampler = Sampler::with_seed(1.0, 1).unwrap();
        let err = sampler.sample(&store, &Context::new(["없음"])).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn single_candidate_is_deterministic() {
        let mut store = MemoryStore::new(3);
        Trainer::new(3)
            .train(&mut store, &[QaPair::new("Q1", "좋아요.").unwrap()])
            .unwrap();
        let ctx = Context::new([BOS, BOS, "좋아요"]);
        for t in [0.01, 0.8, 1.0, 7.0] {
            let mut sampler = Sampler::new(t).unwrap();
            for _ in 0..20 {
                assert_eq!(sampler.sample(&store, &ctx).unwrap(), ".");
            }
        }
    }

    #[test]
    fn seeded_draws_repeat() {
        let mut store = MemoryStore::new(1);
        let ctx = Context::new(["x"]);
        for next in ["a", "b", "c", "c"] {
            store.upsert_increment(&ctx, next).unwrap();
        }
        let draw = |seed| {
            let mut sampler = Sampler::with_seed(0.9, seed).unwrap();
            (0..16)
                .map(|_| sampler.sample(&store, &ctx).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(42), draw(42));
    }
}
