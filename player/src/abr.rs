//! Adaptive bitrate decision engine.
//!
//! Two-tier policy: the engine only ever moves between rank 0 (best) and
//! rank 1 (second best). Lower ranks are reachable through a manual
//! selection only. `down_threshold_kbps` and `up_threshold_kbps` leave a
//! hysteresis band between them, and `cooldown` debounces successive
//! switches.

use crate::config::AbrSettings;
use crate::manifest::{Ladder, Representation};
use crate::throughput::ThroughputSample;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbrPolicy {
    pub down_threshold_kbps: u64,
    pub up_threshold_kbps: u64,
    pub cooldown: Duration,
}

impl Default for AbrPolicy {
    fn default() -> Self {
        Self::from(&AbrSettings::default())
    }
}

impl From<&AbrSettings> for AbrPolicy {
    fn from(settings: &AbrSettings) -> Self {
        Self {
            down_threshold_kbps: settings.down_threshold_kbps,
            up_threshold_kbps: settings.up_threshold_kbps,
            cooldown: settings.cooldown,
        }
    }
}

/// Per-video ABR state. Built fresh for every video.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbrState {
    pub current_rank: usize,
    /// Representation pinned by the user; suspends automatic switching.
    pub manual_override: Option<String>,
    pub last_switch: Option<Instant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub rank: usize,
    pub representation: Representation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchDecision {
    Hold,
    SwitchDown(Target),
    SwitchUp(Target),
}

/// Evaluates one sampling tick.
///
/// Rules, first match wins: manual override holds; an unexpired cooldown
/// holds; fewer than two representations hold; a positive throughput below
/// the down threshold at rank 0 switches to rank 1; a throughput above the
/// up threshold below rank 0 switches to rank 0; anything else holds.
///
/// Both thresholds are strict and compare the undiscounted sample rate.
pub fn decide(
    policy: &AbrPolicy,
    state: AbrState,
    sample: &ThroughputSample,
    ladder: &Ladder,
    now: Instant,
) -> (AbrState, SwitchDecision) {
    if let Some(id) = &state.manual_override {
        debug!(id = id.as_str(), "ABR hold: manual override");
        return (state, SwitchDecision::Hold);
    }

    if let Some(last) = state.last_switch {
        let elapsed = now.saturating_duration_since(last);
        if elapsed < policy.cooldown {
            debug!(elapsed_ms = elapsed.as_millis() as u64, "ABR hold: cooldown");
            return (state, SwitchDecision::Hold);
        }
    }

    if ladder.len() < 2 {
        return (state, SwitchDecision::Hold);
    }

    let kbps = sample.kbps();
    let current = state.current_rank;

    if kbps > 0 && kbps < policy.down_threshold_kbps && current == 0 {
        return switch(state, ladder, 1, now, SwitchDecision::SwitchDown);
    }

    if kbps > policy.up_threshold_kbps && current > 0 {
        return switch(state, ladder, 0, now, SwitchDecision::SwitchUp);
    }

    debug!(kbps, current, "ABR hold: within band");
    (state, SwitchDecision::Hold)
}

fn switch(
    mut state: AbrState,
    ladder: &Ladder,
    rank: usize,
    now: Instant,
    make: fn(Target) -> SwitchDecision,
) -> (AbrState, SwitchDecision) {
    let Some(representation) = ladder.get(rank) else {
        return (state, SwitchDecision::Hold);
    };

    state.current_rank = rank;
    state.last_switch = Some(now);
    let target = Target {
        rank,
        representation: representation.clone(),
    };
    (state, make(target))
}

/// Owns the ABR state of the playing video.
#[derive(Debug, Clone)]
pub struct AbrEngine {
    policy: AbrPolicy,
    state: AbrState,
}

impl AbrEngine {
    pub fn new(policy: AbrPolicy) -> Self {
        Self {
            policy,
            state: AbrState::default(),
        }
    }

    pub fn state(&self) -> &AbrState {
        &self.state
    }

    pub fn is_manual(&self) -> bool {
        self.state.manual_override.is_some()
    }

    pub fn evaluate(
        &mut self,
        sample: &ThroughputSample,
        ladder: &Ladder,
        now: Instant,
    ) -> SwitchDecision {
        let state = std::mem::take(&mut self.state);
        let (state, decision) = decide(&self.policy, state, sample, ladder, now);
        self.state = state;
        decision
    }

    /// Pins the representation at `rank`. Applies no cooldown.
    pub fn select_manual(&mut self, id: &str, rank: usize) {
        self.state.manual_override = Some(id.to_string());
        self.state.current_rank = rank;
    }

    pub fn select_auto(&mut self) {
        self.state.manual_override = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rep(id: &str, height: u32, bandwidth: u64) -> Representation {
        Representation {
            id: id.to_string(),
            height,
            bandwidth,
        }
    }

    fn two_tier() -> Ladder {
        Ladder::new(vec![rep("lo", 240, 400_000), rep("hi", 1080, 4_500_000)])
    }

    fn three_tier() -> Ladder {
        Ladder::new(vec![
            rep("1080", 1080, 4_500_000),
            rep("720", 720, 2_500_000),
            rep("240", 240, 400_000),
        ])
    }

    fn kbps(value: u64) -> ThroughputSample {
        ThroughputSample {
            kbps_instant: value,
            kbps_average: 0,
        }
    }

    fn at_rank(rank: usize) -> AbrState {
        AbrState {
            current_rank: rank,
            ..AbrState::default()
        }
    }

    #[test]
    fn manual_override_always_holds() {
        let policy = AbrPolicy::default();
        let ladder = two_tier();
        let start = Instant::now();
        let now = start + Duration::from_secs(60);
        for rank in [0, 1] {
            for t in [0, 1, 2999, 3000, 3500, 3501, 100_000] {
                for last in [None, Some(now), Some(start)] {
                    let state = AbrState {
                        current_rank: rank,
                        manual_override: Some("lo".to_string()),
                        last_switch: last,
                    };
                    let (next, decision) = decide(&policy, state.clone(), &kbps(t), &ladder, now);
                    assert_eq!(decision, SwitchDecision::Hold);
                    assert_eq!(next, state);
                }
            }
        }
    }

    #[test]
    fn cooldown_holds_regardless_of_throughput() {
        let policy = AbrPolicy::default();
        let ladder = two_tier();
        let last = Instant::now();
        for elapsed_ms in [0, 1, 1500, 2999] {
            let now = last + Duration::from_millis(elapsed_ms);
            for (rank, t) in [(0, 10), (0, 2999), (1, 3501), (1, 50_000)] {
                let state = AbrState {
                    current_rank: rank,
                    manual_override: None,
                    last_switch: Some(last),
                };
                let (_, decision) = decide(&policy, state, &kbps(t), &ladder, now);
                assert_eq!(decision, SwitchDecision::Hold, "{}ms {}kbps", elapsed_ms, t);
            }
        }
    }

    #[test]
    fn down_threshold_is_strict() {
        let policy = AbrPolicy::default();
        let ladder = two_tier();
        let now = Instant::now();

        let (next, decision) = decide(&policy, at_rank(0), &kbps(2999), &ladder, now);
        match decision {
            SwitchDecision::SwitchDown(target) => {
                assert_eq!(target.rank, 1);
                assert_eq!(target.representation.id, "lo");
            }
            other => panic!("expected switch down, got {:?}", other),
        }
        assert_eq!(next.current_rank, 1);
        assert_eq!(next.last_switch, Some(now));

        let (next, decision) = decide(&policy, at_rank(0), &kbps(3000), &ladder, now);
        assert_eq!(decision, SwitchDecision::Hold);
        assert_eq!(next, at_rank(0));
    }

    #[test]
    fn up_threshold_is_strict() {
        let policy = AbrPolicy::default();
        let ladder = two_tier();
        let now = Instant::now();

        let (next, decision) = decide(&policy, at_rank(1), &kbps(3501), &ladder, now);
        match decision {
            SwitchDecision::SwitchUp(target) => {
                assert_eq!(target.rank, 0);
                assert_eq!(target.representation.id, "hi");
            }
            other => panic!("expected switch up, got {:?}", other),
        }
        assert_eq!(next.current_rank, 0);

        let (_, decision) = decide(&policy, at_rank(1), &kbps(3500), &ladder, now);
        assert_eq!(decision, SwitchDecision::Hold);
    }

    #[test]
    fn zero_throughput_never_switches_down() {
        let (_, decision) = decide(
            &AbrPolicy::default(),
            at_rank(0),
            &kbps(0),
            &two_tier(),
            Instant::now(),
        );
        assert_eq!(decision, SwitchDecision::Hold);
    }

    #[test]
    fn average_is_used_without_transfer() {
        let sample = ThroughputSample {
            kbps_instant: 0,
            kbps_average: 1200,
        };
        let (_, decision) = decide(
            &AbrPolicy::default(),
            at_rank(0),
            &sample,
            &two_tier(),
            Instant::now(),
        );
        assert!(matches!(decision, SwitchDecision::SwitchDown(_)));
    }

    #[test]
    fn single_representation_always_holds() {
        let policy = AbrPolicy::default();
        let ladder = Ladder::new(vec![rep("only", 720, 2_500_000)]);
        let now = Instant::now();
        for rank in [0, 1] {
            for t in [0, 1, 2999, 3000, 3501, 100_000] {
                let (_, decision) = decide(&policy, at_rank(rank), &kbps(t), &ladder, now);
                assert_eq!(decision, SwitchDecision::Hold);
            }
        }

        let (_, decision) = decide(&policy, at_rank(0), &kbps(10), &Ladder::default(), now);
        assert_eq!(decision, SwitchDecision::Hold);
    }

    #[test]
    fn only_top_two_ranks_are_used() {
        let policy = AbrPolicy::default();
        let ladder = three_tier();
        let now = Instant::now();

        let (next, decision) = decide(&policy, at_rank(0), &kbps(100), &ladder, now);
        match decision {
            SwitchDecision::SwitchDown(target) => assert_eq!(target.representation.id, "720"),
            other => panic!("expected switch down, got {:?}", other),
        }

        // Already at rank 1: no further step down however low the rate.
        let later = now + Duration::from_secs(10);
        let (_, decision) = decide(&policy, next, &kbps(100), &ladder, later);
        assert_eq!(decision, SwitchDecision::Hold);

        // From rank 2 the way up goes straight to rank 0.
        let (_, decision) = decide(&policy, at_rank(2), &kbps(9000), &ladder, later);
        match decision {
            SwitchDecision::SwitchUp(target) => assert_eq!(target.rank, 0),
            other => panic!("expected switch up, got {:?}", other),
        }
    }

    #[test]
    fn switch_sequence() {
        let mut engine = AbrEngine::new(AbrPolicy::default());
        let ladder = two_tier();
        let t0 = Instant::now();

        let decision = engine.evaluate(&kbps(2000), &ladder, t0);
        assert!(matches!(decision, SwitchDecision::SwitchDown(ref t) if t.rank == 1));

        let decision = engine.evaluate(&kbps(2000), &ladder, t0 + Duration::from_millis(1000));
        assert_eq!(decision, SwitchDecision::Hold);

        let decision = engine.evaluate(&kbps(2000), &ladder, t0 + Duration::from_millis(3100));
        assert_eq!(decision, SwitchDecision::Hold);

        let decision = engine.evaluate(&kbps(4000), &ladder, t0 + Duration::from_millis(3200));
        assert!(matches!(decision, SwitchDecision::SwitchUp(ref t) if t.rank == 0));
        assert_eq!(engine.state().current_rank, 0);
        assert_eq!(
            engine.state().last_switch,
            Some(t0 + Duration::from_millis(3200))
        );
    }

    #[test]
    fn auto_resumes_from_manual_rank() {
        let mut engine = AbrEngine::new(AbrPolicy::default());
        let ladder = two_tier();
        let now = Instant::now();

        engine.select_manual("lo", 1);
        assert!(engine.is_manual());
        assert_eq!(engine.evaluate(&kbps(9000), &ladder, now), SwitchDecision::Hold);

        engine.select_auto();
        assert!(!engine.is_manual());
        let decision = engine.evaluate(&kbps(9000), &ladder, now);
        assert!(matches!(decision, SwitchDecision::SwitchUp(_)));
    }

    #[test]
    fn policy_from_settings() {
        let settings = AbrSettings {
            down_threshold_kbps: 1000,
            up_threshold_kbps: 1200,
            cooldown: Duration::from_secs(5),
            ..AbrSettings::default()
        };
        let policy = AbrPolicy::from(&settings);
        assert_eq!(policy.down_threshold_kbps, 1000);
        assert_eq!(policy.up_threshold_kbps, 1200);
        assert_eq!(policy.cooldown, Duration::from_secs(5));
    }
}
