//! Stage schedule: a piecewise-linear target-concurrency function over time.
use crate::error::Error;
use std::time::Duration;

/// One ramp segment of a run: hold or move toward `target` over `duration`.
///
/// Stages are consumed in order and are immutable once a run starts. A
/// zero-duration stage snaps concurrency to its target instantly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: u32,
}

impl Stage {
    pub fn new(duration: Duration, target: u32) -> Self {
        Self { duration, target }
    }

    /// Build a stage from a human-readable duration string (`"10s"`, `"1m50s"`).
    pub fn parse(duration: &str, target: u32) -> Result<Self, Error> {
        let duration = humantime::parse_duration(duration).map_err(|source| {
            Error::InvalidDuration {
                input: duration.to_string(),
                source,
            }
        })?;
        Ok(Self { duration, target })
    }
}

/// Precomputed interpolation segments for an ordered stage sequence.
///
/// Each stage interpolates linearly from the concurrency level at its start
/// (the previous stage's target, 0 for the first stage) to its own target.
#[derive(Debug, Clone)]
pub(crate) struct StageSchedule {
    segments: Vec<Segment>,
    total: Duration,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    start: Duration,
    duration: Duration,
    from: f64,
    to: f64,
}

impl StageSchedule {
    pub fn new(stages: &[Stage]) -> Result<Self, Error> {
        if stages.is_empty() {
            return Err(Error::NoStages);
        }

        let mut segments = Vec::with_capacity(stages.len());
        let mut offset = Duration::ZERO;
        let mut level = 0f64;
        for stage in stages {
            segments.push(Segment {
                start: offset,
                duration: stage.duration,
                from: level,
                to: stage.target as f64,
            });
            offset += stage.duration;
            level = stage.target as f64;
        }

        Ok(Self {
            segments,
            total: offset,
        })
    }

    /// Target concurrency at `elapsed`, or `None` once the schedule is
    /// exhausted and the run should complete.
    pub fn target_at(&self, elapsed: Duration) -> Option<u32> {
        if elapsed >= self.total {
            return None;
        }

        for segment in &self.segments {
            // Zero-duration segments never match; they only set the level
            // the next segment starts from, which is the snap behavior.
            if elapsed < segment.start + segment.duration {
                let frac = (elapsed - segment.start).as_secs_f64()
                    / segment.duration.as_secs_f64();
                let level = segment.from + (segment.to - segment.from) * frac;
                return Some(level.round() as u32);
            }
        }

        None
    }

    pub fn total_duration(&self) -> Duration {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(stages: &[Stage]) -> StageSchedule {
        StageSchedule::new(stages).unwrap()
    }

    #[test]
    fn empty_stage_list_is_rejected() {
        assert!(matches!(StageSchedule::new(&[]), Err(Error::NoStages)));
    }

    #[test]
    fn parse_human_durations() {
        let stage = Stage::parse("1m50s", 50).unwrap();
        assert_eq!(stage.duration, Duration::from_secs(110));
        assert!(Stage::parse("eleventy", 50).is_err());
    }

    #[test]
    fn linear_ramp_up() {
        let s = schedule(&[Stage::new(Duration::from_secs(10), 50)]);
        assert_eq!(s.target_at(Duration::ZERO), Some(0));
        assert_eq!(s.target_at(Duration::from_secs(5)), Some(25));
        assert_eq!(s.target_at(Duration::from_millis(9_999)), Some(50));
        assert_eq!(s.target_at(Duration::from_secs(10)), None);
    }

    #[test]
    fn hold_then_instant_drop() {
        // 0->50 over 10s, hold 50 for 110s, snap to 0, terminate.
        let s = schedule(&[
            Stage::new(Duration::from_secs(10), 50),
            Stage::new(Duration::from_secs(110), 50),
            Stage::new(Duration::ZERO, 0),
        ]);

        assert_eq!(s.target_at(Duration::from_secs(2)), Some(10));
        assert_eq!(s.target_at(Duration::from_secs(10)), Some(50));
        assert_eq!(s.target_at(Duration::from_secs(60)), Some(50));
        assert_eq!(s.target_at(Duration::from_millis(119_999)), Some(50));
        assert_eq!(s.target_at(Duration::from_secs(120)), None);
        assert_eq!(s.total_duration(), Duration::from_secs(120));
    }

    #[test]
    fn zero_duration_stage_snaps() {
        let s = schedule(&[
            Stage::new(Duration::ZERO, 10),
            Stage::new(Duration::from_secs(10), 10),
        ]);
        assert_eq!(s.target_at(Duration::ZERO), Some(10));
        assert_eq!(s.target_at(Duration::from_secs(5)), Some(10));
    }

    #[test]
    fn ramp_down_interpolates() {
        let s = schedule(&[
            Stage::new(Duration::ZERO, 40),
            Stage::new(Duration::from_secs(10), 0),
        ]);
        assert_eq!(s.target_at(Duration::ZERO), Some(40));
        assert_eq!(s.target_at(Duration::from_secs(5)), Some(20));
        assert_eq!(s.target_at(Duration::from_millis(9_999)), Some(0));
    }

    #[test]
    fn target_never_exceeds_max_reached_so_far() {
        let s = schedule(&[
            Stage::new(Duration::from_secs(10), 30),
            Stage::new(Duration::from_secs(5), 10),
            Stage::new(Duration::from_secs(5), 25),
        ]);

        let mut max_seen = 0u32;
        let mut t = Duration::ZERO;
        while let Some(target) = s.target_at(t) {
            max_seen = max_seen.max(target);
            assert!(target <= max_seen);
            assert!(target <= 30);
            t += Duration::from_millis(100);
        }
        assert_eq!(max_seen, 30);
    }
}
