//! Review-progress filters over a dataset and a reviewer's annotations.

use std::fmt;
use std::str::FromStr;

use crate::dataset::ReviewItem;
use crate::record::{Annotations, Judgement, JudgmentRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReviewFilter {
    #[default]
    All,
    /// No record, or a record without a verdict.
    Unchecked,
    /// OK or NG.
    Checked,
    Ng,
    /// Non-blank memo, regardless of verdict.
    Memo,
}

impl ReviewFilter {
    pub const ALL: [ReviewFilter; 5] = [
        Self::All,
        Self::Unchecked,
        Self::Checked,
        Self::Ng,
        Self::Memo,
    ];

    pub fn matches(self, record: Option<&JudgmentRecord>) -> bool {
        match self {
            Self::All => true,
            Self::Unchecked => record.is_none_or(|r| !r.judgement.is_set()),
            Self::Checked => record.is_some_and(|r| r.judgement.is_set()),
            Self::Ng => record.is_some_and(|r| r.judgement == Judgement::Ng),
            Self::Memo => record.is_some_and(JudgmentRecord::has_memo),
        }
    }

    /// Items passing this filter, in dataset order.
    pub fn apply<'a>(
        self,
        items: &'a [ReviewItem],
        annotations: &Annotations,
    ) -> Vec<&'a ReviewItem> {
        items
            .iter()
            .filter(|item| self.matches(annotations.get(&item.key)))
            .collect()
    }
}

impl fmt::Display for ReviewFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::All => "all",
            Self::Unchecked => "unchecked",
            Self::Checked => "checked",
            Self::Ng => "ng",
            Self::Memo => "memo",
        })
    }
}

impl FromStr for ReviewFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "unchecked" => Ok(Self::Unchecked),
            "checked" => Ok(Self::Checked),
            "ng" => Ok(Self::Ng),
            "memo" => Ok(Self::Memo),
            other => Err(format!(
                "unknown filter '{other}' (expected all, unchecked, checked, ng, memo)"
            )),
        }
    }
}

/// Item counts per filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewSummary {
    pub all: usize,
    pub unchecked: usize,
    pub checked: usize,
    pub ng: usize,
    pub memo: usize,
    /// Records whose key matches no item in the dataset.
    pub orphaned: usize,
}

impl ReviewSummary {
    pub fn tally(items: &[ReviewItem], annotations: &Annotations) -> Self {
        let mut summary = Self::default();
        for item in items {
            let record = annotations.get(&item.key);
            for filter in ReviewFilter::ALL {
                if filter.matches(record) {
                    *summary.slot(filter) += 1;
                }
            }
        }
        summary.orphaned = annotations
            .keys()
            .filter(|key| !items.iter().any(|item| &item.key == *key))
            .count();
        summary
    }

    pub fn count(&self, filter: ReviewFilter) -> usize {
        match filter {
            ReviewFilter::All => self.all,
            ReviewFilter::Unchecked => self.unchecked,
            ReviewFilter::Checked => self.checked,
            ReviewFilter::Ng => self.ng,
            ReviewFilter::Memo => self.memo,
        }
    }

    fn slot(&mut self, filter: ReviewFilter) -> &mut usize {
        match filter {
            ReviewFilter::All => &mut self.all,
            ReviewFilter::Unchecked => &mut self.unchecked,
            ReviewFilter::Checked => &mut self.checked,
            ReviewFilter::Ng => &mut self.ng,
            ReviewFilter::Memo => &mut self.memo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Candidate, Dataset, ReferenceEntry};
    use crate::key::CandidateKey;
    use crate::record::RecordPatch;

    const TS: &str = "2026-01-05T09:00:00.000Z";

    fn items() -> Vec<ReviewItem> {
        let entries = ["a", "b", "a", "c"]
            .iter()
            .map(|f| ReferenceEntry {
                file: f.to_string(),
                text: "Foo Act (FA)".into(),
                law_name: "Foo Act".into(),
                candidates: vec![Candidate {
                    formal: "Foo Act".into(),
                    abbr: "FA".into(),
                }],
            })
            .collect();
        Dataset::new(entries).review_items()
    }

    fn record(patch: RecordPatch) -> JudgmentRecord {
        let mut r = JudgmentRecord::default();
        r.apply(&patch, TS);
        r
    }

    fn annotations() -> Annotations {
        let mut a = Annotations::new();
        a.insert(CandidateKey::from("a_0"), record(RecordPatch::ok()));
        let mut ng = RecordPatch::ng("Foo Bar Act", "FBA");
        ng.memo = Some("typo in source".into());
        a.insert(CandidateKey::from("b_1"), record(ng));
        a.insert(CandidateKey::from("a_2"), record(RecordPatch::memo("   ")));
        a.insert(CandidateKey::from("zz_99"), record(RecordPatch::ok()));
        a
    }

    #[test]
    fn filters_select_expected_keys() {
        let items = items();
        let a = annotations();
        let keys = |f: ReviewFilter| -> Vec<String> {
            f.apply(&items, &a).iter().map(|i| i.key.to_string()).collect()
        };
        assert_eq!(keys(ReviewFilter::All), ["a_0", "b_1", "a_2", "c_3"]);
        assert_eq!(keys(ReviewFilter::Unchecked), ["a_2", "c_3"]);
        assert_eq!(keys(ReviewFilter::Checked), ["a_0", "b_1"]);
        assert_eq!(keys(ReviewFilter::Ng), ["b_1"]);
        assert_eq!(keys(ReviewFilter::Memo), ["b_1"]);
    }

    #[test]
    fn summary_counts() {
        let summary = ReviewSummary::tally(&items(), &annotations());
        assert_eq!(summary.all, 4);
        assert_eq!(summary.unchecked, 2);
        assert_eq!(summary.checked, 2);
        assert_eq!(summary.ng, 1);
        assert_eq!(summary.memo, 1);
        assert_eq!(summary.orphaned, 1);
        assert_eq!(summary.count(ReviewFilter::Checked), 2);
    }

    #[test]
    fn filter_names_round_trip() {
        for filter in ReviewFilter::ALL {
            assert_eq!(filter.to_string().parse::<ReviewFilter>().unwrap(), filter);
        }
        assert_eq!("NG".parse::<ReviewFilter>().unwrap(), ReviewFilter::Ng);
        assert!("pending".parse::<ReviewFilter>().is_err());
    }
}
