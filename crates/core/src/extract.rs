use crate::error::RagError;
use crate::models::Flashcard;
use regex::Regex;
use serde_json::Value;

/// Stand-in for a card field the model left out.
pub const MISSING_FIELD: &str = "❓";

/// Outcome of a successful extraction. `Partial` means at least one field was
/// replaced by [`MISSING_FIELD`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashcardExtraction {
    Complete(Vec<Flashcard>),
    Partial {
        cards: Vec<Flashcard>,
        substituted: usize,
    },
}

impl FlashcardExtraction {
    pub fn cards(&self) -> &[Flashcard] {
        match self {
            Self::Complete(cards) | Self::Partial { cards, .. } => cards,
        }
    }

    pub fn into_cards(self) -> Vec<Flashcard> {
        match self {
            Self::Complete(cards) | Self::Partial { cards, .. } => cards,
        }
    }

    pub fn substituted(&self) -> usize {
        match self {
            Self::Complete(_) => 0,
            Self::Partial { substituted, .. } => *substituted,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

/// Recovers a JSON array of flashcards from free-form model output. The span
/// from the first `[` to the last `]` is parsed; without one the whole text is.
pub fn extract_json_array(raw: &str) -> Result<FlashcardExtraction, RagError> {
    let array_span = Regex::new(r"(?s)\[.*\]")?;
    let candidate = array_span
        .find(raw)
        .map(|found| found.as_str())
        .unwrap_or(raw);

    let parsed: Value = serde_json::from_str(candidate).map_err(|error| RagError::Parse {
        message: error.to_string(),
        raw: raw.to_string(),
    })?;

    let Value::Array(items) = parsed else {
        return Err(RagError::Parse {
            message: "model output is not a JSON array".to_string(),
            raw: raw.to_string(),
        });
    };

    let mut substituted = 0;
    let cards = items
        .iter()
        .map(|item| {
            let (question, question_missing) = card_field(item, "question");
            let (answer, answer_missing) = card_field(item, "answer");
            substituted += usize::from(question_missing) + usize::from(answer_missing);
            Flashcard { question, answer }
        })
        .collect();

    if substituted == 0 {
        Ok(FlashcardExtraction::Complete(cards))
    } else {
        Ok(FlashcardExtraction::Partial { cards, substituted })
    }
}

fn card_field(item: &Value, name: &str) -> (String, bool) {
    match item.get(name) {
        Some(Value::String(text)) => (text.clone(), false),
        Some(Value::Null) | None => (MISSING_FIELD.to_string(), true),
        Some(other) => (other.to_string(), false),
    }
}
