pub mod dataset;
pub mod highlight;
pub mod key;
pub mod record;
pub mod review;

pub use dataset::{Candidate, Dataset, DatasetError, ReferenceEntry, ReviewItem};
pub use highlight::{Highlight, Markup, highlight, highlight_excerpt, highlight_with};
pub use key::{CandidateKey, KeyScheme, LegacyKeyIndex};
pub use record::{Annotations, Judgement, JudgmentRecord, Patch, RecordPatch};
pub use review::{ReviewFilter, ReviewSummary};
