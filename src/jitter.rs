use rand::Rng;
use tokio::time::Duration;

pub trait Jitter: Sized {
    /// Returns a duration drawn uniformly from `[0, self)`.
    fn jitter(&self) -> Self;
}

impl Jitter for Duration {
    fn jitter(&self) -> Self {
        let nanos = self.as_nanos();
        if nanos == 0 {
            return Duration::ZERO;
        }
        let mut rng = rand::rng();
        let nanos = rng.random_range(0..nanos);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_jitter_stays_below_period() {
        let period = Duration::from_secs(20);
        for _ in 0..1000 {
            assert!(period.jitter() < period);
        }
    }

    #[test]
    fn test_zero_period() {
        assert_eq!(Duration::ZERO.jitter(), Duration::ZERO);
    }
}
