use std::sync::Arc;

use phrase_verdict::{SpecialTokens, Vocabulary};

pub use phrase_verdict::tests::support::{StubEngine, approx_eq};

pub const VOCAB_JSON: &str = r#"{
    "[PAD]": 0, "[UNK]": 1, "[CLS]": 2, "[SEP]": 3,
    "de": 10, "kat": 11, "zit": 12, "op": 13, "mat": 14, "het": 15, "is": 16, "goed": 17
}"#;

#[must_use]
pub fn vocab() -> Arc<Vocabulary> {
    Arc::new(
        Vocabulary::from_json(VOCAB_JSON, &SpecialTokens::default())
            .unwrap_or_else(|e| panic!("test vocabulary: {e}")),
    )
}
