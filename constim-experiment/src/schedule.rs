use crate::config::Randomization;
use constim_core::Condition;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// One scheduled presentation of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// 0-based position in the session sequence.
    pub index: usize,
    /// Which pass over the conditions this trial belongs to (0-based).
    pub repetition: usize,
    pub condition: Condition,
}

/// Randomized trial sequence plus a cursor over it.
#[derive(Debug, Clone, Default)]
pub struct TrialSchedule {
    trials: Vec<Trial>,
    cursor: usize,
}

impl TrialSchedule {
    /// Expands `conditions` into `repetitions` passes ordered by `policy`.
    ///
    /// Whatever the policy, each condition appears exactly `repetitions` times.
    pub fn new<R: Rng + ?Sized>(
        conditions: &[Condition],
        repetitions: usize,
        policy: Randomization,
        rng: &mut R,
    ) -> Self {
        let mut order: Vec<(usize, &Condition)> =
            Vec::with_capacity(conditions.len() * repetitions);
        for rep in 0..repetitions {
            let mut pass: Vec<&Condition> = conditions.iter().collect();
            if policy == Randomization::Block {
                pass.shuffle(rng);
            }
            order.extend(pass.into_iter().map(|c| (rep, c)));
        }
        if policy == Randomization::Full {
            order.shuffle(rng);
        }

        let trials = order
            .into_iter()
            .enumerate()
            .map(|(index, (repetition, condition))| Trial {
                index,
                repetition,
                condition: *condition,
            })
            .collect();

        Self { trials, cursor: 0 }
    }

    pub fn total(&self) -> usize {
        self.trials.len()
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn current(&self) -> Option<&Trial> {
        self.trials.get(self.cursor)
    }

    /// 1-based position of the current trial; equals `total()` once exhausted.
    pub fn position(&self) -> usize {
        (self.cursor + 1).min(self.total())
    }

    pub fn progress(&self) -> (usize, usize) {
        (self.position(), self.total())
    }

    /// Number of trials already consumed.
    pub fn consumed(&self) -> usize {
        self.cursor.min(self.total())
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.trials.len()
    }

    /// Moves past the current trial and returns the next one, if any.
    pub fn advance(&mut self) -> Option<&Trial> {
        if !self.is_exhausted() {
            self.cursor += 1;
        }
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::enumerate_conditions;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn counts(schedule: &TrialSchedule, k: usize) -> Vec<usize> {
        let mut counts = vec![0; k];
        for t in schedule.trials() {
            counts[t.condition.index] += 1;
        }
        counts
    }

    #[test]
    fn every_policy_keeps_per_condition_counts() {
        let conds = enumerate_conditions(&[0.0, 0.05, 0.1], &[0.25, 1.0, 5.0]);
        for policy in [
            Randomization::Block,
            Randomization::Full,
            Randomization::Sequential,
        ] {
            let mut rng = StdRng::seed_from_u64(11);
            let schedule = TrialSchedule::new(&conds, 4, policy, &mut rng);
            assert_eq!(schedule.total(), 36, "{policy:?}");
            assert!(counts(&schedule, conds.len()).iter().all(|&n| n == 4));
            let indices: Vec<usize> = schedule.trials().iter().map(|t| t.index).collect();
            assert_eq!(indices, (0..36).collect::<Vec<_>>());
        }
    }

    #[test]
    fn block_policy_covers_every_condition_per_pass() {
        let conds = enumerate_conditions(&[0.0, 0.05], &[0.25, 1.0, 5.0]);
        let mut rng = StdRng::seed_from_u64(3);
        let schedule = TrialSchedule::new(&conds, 5, Randomization::Block, &mut rng);
        for (rep, pass) in schedule.trials().chunks(conds.len()).enumerate() {
            let mut seen: Vec<usize> = pass.iter().map(|t| t.condition.index).collect();
            seen.sort();
            assert_eq!(seen, (0..conds.len()).collect::<Vec<_>>());
            assert!(pass.iter().all(|t| t.repetition == rep));
        }
    }

    #[test]
    fn sequential_policy_repeats_enumeration_order() {
        let conds = enumerate_conditions(&[0.0, 0.05], &[0.25, 1.0]);
        let mut rng = StdRng::seed_from_u64(0);
        let schedule = TrialSchedule::new(&conds, 2, Randomization::Sequential, &mut rng);
        let order: Vec<usize> = schedule.trials().iter().map(|t| t.condition.index).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 0, 1, 2, 3]);
    }

    #[test]
    fn same_seed_same_order() {
        let conds = enumerate_conditions(&[0.0, 0.05, 0.1], &[1.0, 2.0]);
        let a = TrialSchedule::new(
            &conds,
            3,
            Randomization::Full,
            &mut StdRng::seed_from_u64(42),
        );
        let b = TrialSchedule::new(
            &conds,
            3,
            Randomization::Full,
            &mut StdRng::seed_from_u64(42),
        );
        assert_eq!(a.trials(), b.trials());
    }

    #[test]
    fn cursor_tracks_progress_until_exhausted() {
        let conds = enumerate_conditions(&[0.0, 0.05], &[0.25, 1.0]);
        let mut rng = StdRng::seed_from_u64(1);
        let mut schedule = TrialSchedule::new(&conds, 2, Randomization::Block, &mut rng);

        assert_eq!(schedule.progress(), (1, 8));
        for expected in 2..=8 {
            assert!(schedule.advance().is_some());
            assert_eq!(schedule.position(), expected);
        }
        assert!(schedule.advance().is_none());
        assert!(schedule.is_exhausted());
        assert_eq!(schedule.consumed(), 8);
        assert_eq!(schedule.progress(), (8, 8));
        assert!(schedule.advance().is_none());
    }

    #[test]
    fn zero_repetitions_or_conditions_is_empty() {
        let conds = enumerate_conditions(&[0.1], &[1.0]);
        let mut rng = StdRng::seed_from_u64(0);
        let schedule = TrialSchedule::new(&conds, 0, Randomization::Block, &mut rng);
        assert!(schedule.is_exhausted());
        assert_eq!(schedule.progress(), (0, 0));

        let schedule = TrialSchedule::new(&[], 10, Randomization::Full, &mut rng);
        assert_eq!(schedule.total(), 0);
        assert!(schedule.current().is_none());
    }
}
