use crate::results::ResultsTable;
use constim_core::{Answer, Condition};
use std::fmt;

/// Detection counts for one condition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditionSummary {
    pub condition: Condition,
    pub presented: usize,
    pub detected: usize,
}

impl ConditionSummary {
    /// Proportion of "seen" answers; `None` when the condition was never answered.
    pub fn proportion(&self) -> Option<f64> {
        (self.presented > 0).then(|| self.detected as f64 / self.presented as f64)
    }
}

impl fmt::Display for ConditionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "contrast {:>5.3}  freq {:>6.2} c/deg  seen {:>3}/{:<3}",
            self.condition.contrast, self.condition.frequency, self.detected, self.presented
        )?;
        match self.proportion() {
            Some(p) => write!(f, "  ({:.0}%)", p * 100.0),
            None => write!(f, "  (-)"),
        }
    }
}

/// Per-condition detection counts, in enumeration order.
pub fn summarize(table: &ResultsTable) -> Vec<ConditionSummary> {
    let mut rows: Vec<ConditionSummary> = table
        .conditions
        .iter()
        .map(|&condition| ConditionSummary {
            condition,
            presented: 0,
            detected: 0,
        })
        .collect();

    for record in &table.records {
        if let Some(row) = rows.get_mut(record.condition.index) {
            row.presented += 1;
            if record.answer == Answer::Detected {
                row.detected += 1;
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExperimentConfig;
    use crate::conditions::enumerate_conditions;
    use crate::results::{ResponseRecord, SessionOutcome};
    use chrono::Utc;

    fn record(index: usize, condition: Condition, answer: Answer) -> ResponseRecord {
        ResponseRecord {
            trial_index: index,
            repetition: 0,
            condition,
            answer,
            timestamp_ns: 0,
        }
    }

    #[test]
    fn counts_detections_per_condition() {
        let conditions = enumerate_conditions(&[0.0, 0.1], &[1.0]);
        let table = ResultsTable {
            extra_info: ExperimentConfig::new("eve", vec![0.0, 0.1], vec![1.0], 2),
            conditions: conditions.clone(),
            trial_order: vec![0, 1, 1, 0],
            records: vec![
                record(0, conditions[0], Answer::NotDetected),
                record(1, conditions[1], Answer::Detected),
                record(2, conditions[1], Answer::Detected),
            ],
            outcome: SessionOutcome::Aborted,
            started_at: None,
            finished_at: Utc::now(),
        };

        let rows = summarize(&table);
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].presented, rows[0].detected), (1, 0));
        assert_eq!((rows[1].presented, rows[1].detected), (2, 2));
        assert_eq!(rows[0].proportion(), Some(0.0));
        assert_eq!(rows[1].proportion(), Some(1.0));
        assert!(rows[1].to_string().contains("(100%)"));
    }

    #[test]
    fn unanswered_condition_has_no_proportion() {
        let conditions = enumerate_conditions(&[0.2], &[5.0]);
        let row = ConditionSummary {
            condition: conditions[0],
            presented: 0,
            detected: 0,
        };
        assert_eq!(row.proportion(), None);
        assert!(row.to_string().ends_with("(-)"));
    }
}
