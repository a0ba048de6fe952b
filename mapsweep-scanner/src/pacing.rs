use rand::Rng;
use std::time::Duration;
use tracing::debug;

/// Inclusive range a random pause is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    pub const fn millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    pub const fn fixed(delay: Duration) -> Self {
        Self {
            min: delay,
            max: delay,
        }
    }

    pub fn sample(&self) -> Duration {
        let (lo, hi) = if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        };
        if lo == hi {
            return lo;
        }
        let lo_ms = lo.as_millis() as u64;
        let hi_ms = hi.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(lo_ms..=hi_ms))
    }
}

/// Human-scale pauses between browser actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Between typed characters.
    pub keystroke: DelayRange,
    /// After submitting the search.
    pub after_submit: DelayRange,
    /// After scrolling an element into view.
    pub scroll_settle: DelayRange,
    /// Fixed wait for the detail panel after a click.
    pub detail_settle: DelayRange,
    /// Generic pause after dismissing dialogs or scrolling the list.
    pub action: DelayRange,
    /// After a record has been collected.
    pub after_record: DelayRange,
    /// Between search terms.
    pub between_terms: DelayRange,
}

impl Pacing {
    /// No pauses at all.
    pub fn none() -> Self {
        Self {
            keystroke: DelayRange::ZERO,
            after_submit: DelayRange::ZERO,
            scroll_settle: DelayRange::ZERO,
            detail_settle: DelayRange::ZERO,
            action: DelayRange::ZERO,
            after_record: DelayRange::ZERO,
            between_terms: DelayRange::ZERO,
        }
    }

    pub async fn pause(&self, range: DelayRange) {
        let delay = range.sample();
        if delay.is_zero() {
            return;
        }
        debug!("Human delay: {:.2}s", delay.as_secs_f64());
        tokio::time::sleep(delay).await;
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            keystroke: DelayRange::millis(50, 120),
            after_submit: DelayRange::millis(1200, 2000),
            scroll_settle: DelayRange::millis(400, 800),
            detail_settle: DelayRange::fixed(Duration::from_millis(600)),
            action: DelayRange::millis(2000, 4000),
            after_record: DelayRange::millis(4000, 5000),
            between_terms: DelayRange::millis(2000, 4000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_stays_in_range() {
        let range = DelayRange::millis(50, 120);
        for _ in 0..200 {
            let d = range.sample();
            assert!(d >= Duration::from_millis(50) && d <= Duration::from_millis(120));
        }
    }

    #[test]
    fn test_inverted_range_is_normalized() {
        let range = DelayRange::millis(900, 300);
        for _ in 0..50 {
            let d = range.sample();
            assert!(d >= Duration::from_millis(300) && d <= Duration::from_millis(900));
        }
    }

    #[test]
    fn test_fixed_range() {
        assert_eq!(
            DelayRange::fixed(Duration::from_millis(600)).sample(),
            Duration::from_millis(600)
        );
        assert_eq!(DelayRange::ZERO.sample(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_none_never_sleeps() {
        let started = tokio::time::Instant::now();
        let pacing = Pacing::none();
        pacing.pause(pacing.after_record).await;
        pacing.pause(pacing.between_terms).await;
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
