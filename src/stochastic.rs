//! Timestep-consistent probabilities and distance-decayed influence.
//!
//! Every probability parameter is calibrated to a reference step of one hour.
//! `prob_time` rescales it to an arbitrary step length, so halving the step
//! does not change the expected event rate.

use rand::Rng;

/// Contribution of a neighbor sitting exactly at its influence radius.
pub const INFLUENCE_THRESHOLD: f64 = 0.001;

/// Probability of an event over `dt` reference steps given its per-step probability `p0`.
///
/// `P(dt) = 1 - (1 - p0)^dt`
#[inline]
pub fn prob_time(p0: f64, dt: f64) -> f64 {
    let p0 = p0.clamp(0.0, 1.0);
    1.0 - (1.0 - p0).powf(dt)
}

/// Draws once against `prob_time(p0, dt)`.
#[inline]
pub fn occurs<R: Rng + ?Sized>(rng: &mut R, p0: f64, dt: f64) -> bool {
    rng.random::<f64>() < prob_time(p0, dt)
}

/// Exponential decay of influence with distance, equal to `INFLUENCE_THRESHOLD`
/// at `distance == influence_radius`. A non-positive radius exerts no influence.
#[inline]
pub fn influence_decay(distance: f64, influence_radius: f64) -> f64 {
    if influence_radius <= 0.0 {
        return 0.0;
    }
    let lambda = -INFLUENCE_THRESHOLD.ln() / influence_radius;
    (-lambda * distance).exp()
}

/// Probability that at least one of two independent sources acts.
#[inline]
pub fn compose_influence(accumulated: f64, contribution: f64) -> f64 {
    1.0 - (1.0 - accumulated) * (1.0 - contribution)
}
