#![forbid(unsafe_code)]

use voicenudge_kernel_contracts::task::{CategoryLabel, PriorityLabel};

/// Assigns a category label to task text. Implementations may be model-backed
/// or rule-based; callers only see the label.
pub trait CategoryClassifier {
    fn predict_category(&self, text: &str) -> CategoryLabel;
}

/// Assigns a priority label to task text.
pub trait PriorityClassifier {
    fn predict_priority(&self, text: &str) -> PriorityLabel;
}

const CATEGORY_TABLE: &[(&str, &[&str])] = &[
    (
        "Work",
        &[
            "meeting", "deadline", "report", "email", "client", "project", "presentation",
            "office", "standup", "review",
        ],
    ),
    (
        "Health",
        &[
            "doctor", "dentist", "gym", "workout", "medicine", "appointment", "checkup",
            "yoga", "run",
        ],
    ),
    (
        "Shopping",
        &[
            "buy", "order", "grocery", "groceries", "shop", "purchase", "milk", "vegetables",
        ],
    ),
    (
        "Finance",
        &[
            "pay", "bill", "rent", "invoice", "bank", "transfer", "tax", "emi", "recharge",
        ],
    ),
];

const DEFAULT_CATEGORY: &str = "Personal";

const HIGH_PRIORITY_WORDS: &[&str] = &[
    "urgent", "asap", "immediately", "today", "tonight", "now", "critical", "important",
    "deadline",
];
const LOW_PRIORITY_WORDS: &[&str] = &["sometime", "someday", "eventually", "whenever", "later"];
const DEFAULT_PRIORITY: &str = "Medium";

/// Keyword-table classifier used when no trained model is wired in. Falls
/// back to `Personal` when nothing matches.
#[derive(Debug, Clone, Default)]
pub struct KeywordCategoryClassifier;

impl CategoryClassifier for KeywordCategoryClassifier {
    fn predict_category(&self, text: &str) -> CategoryLabel {
        let lower = text.to_lowercase();
        let label = CATEGORY_TABLE
            .iter()
            .find(|(_, words)| contains_any(&lower, words))
            .map(|(label, _)| *label)
            .unwrap_or(DEFAULT_CATEGORY);
        CategoryLabel::new(label).expect("table labels are valid")
    }
}

/// Keyword-table priority classifier; falls back to `Medium`.
#[derive(Debug, Clone, Default)]
pub struct KeywordPriorityClassifier;

impl PriorityClassifier for KeywordPriorityClassifier {
    fn predict_priority(&self, text: &str) -> PriorityLabel {
        let lower = text.to_lowercase();
        let label = if contains_any(&lower, HIGH_PRIORITY_WORDS) {
            "High"
        } else if contains_any(&lower, LOW_PRIORITY_WORDS) {
            "Low"
        } else {
            DEFAULT_PRIORITY
        };
        PriorityLabel::new(label).expect("table labels are valid")
    }
}

fn contains_any(lower_text: &str, words: &[&str]) -> bool {
    lower_text
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| words.contains(&token))
}
