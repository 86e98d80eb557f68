use std::fmt;

pub const NOT_FOUND_ANSWER: &str = "Answer not found in context.";

const CONTEXT_OPEN: &str = "<context>";
const CONTEXT_CLOSE: &str = "</context>";
const CHUNK_SEPARATOR: &str = "\n\n";

/// A fully composed grounding prompt, ready for the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Text between the context delimiters.
    pub fn context(&self) -> &str {
        let start = self
            .0
            .find(CONTEXT_OPEN)
            .map(|position| position + CONTEXT_OPEN.len())
            .unwrap_or(0);
        let end = self.0[start..]
            .find(CONTEXT_CLOSE)
            .map(|position| start + position)
            .unwrap_or(self.0.len());
        self.0[start..end].trim_matches('\n')
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Prompt {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub fn compose<S: AsRef<str>>(question: &str, chunks: &[S]) -> Prompt {
    let context = chunks
        .iter()
        .map(|chunk| neutralize_delimiters(chunk.as_ref()))
        .collect::<Vec<_>>()
        .join(CHUNK_SEPARATOR);
    let question = neutralize_delimiters(question);

    Prompt(format!(
        "You are a skilled AI.\n\
         You need to answer the questions only on the basis of the given context and not with your knowledge.\n\
         If the answer to the given question is not present in the context, say \"{NOT_FOUND_ANSWER}\"\n\
         \n\
         {CONTEXT_OPEN}\n\
         {context}\n\
         {CONTEXT_CLOSE}\n\
         Question: {question}\n"
    ))
}

/// Rewrites context tags so user text cannot open or close the context block.
fn neutralize_delimiters(text: &str) -> String {
    text.replace(CONTEXT_CLOSE, "&lt;/context&gt;")
        .replace(CONTEXT_OPEN, "&lt;context&gt;")
}
