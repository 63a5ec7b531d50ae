use crate::keywords;
use crate::suggest::find_similar;
use crate::token::Span;

/// The four-kind error taxonomy shared by every stage of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Lexer/parser failures: unknown character, unterminated comment or
    /// string, unexpected token, invalid duration or date literal.
    Syntax,
    /// Validator failures: unknown identifier, wrong arity/argument kind,
    /// out-of-range value, type mismatch, undefined or self-reference.
    Semantic,
    /// Cycle detection across a formula batch; `participants` names every
    /// formula caught in the cycle.
    Cycle { participants: Vec<String> },
    /// Executor failures: division by zero, duration overflow, invalid
    /// day-duration, polar zero-instant, nonexistent date, missing
    /// reference, conditional without else, `first_valid` exhausted.
    Runtime,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub suggestion: Option<String>,
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Diagnostic { kind: DiagnosticKind::Syntax, message: message.into(), suggestion: None, span: Some(span) }
    }

    pub fn semantic(message: impl Into<String>, span: Span) -> Self {
        Diagnostic { kind: DiagnosticKind::Semantic, message: message.into(), suggestion: None, span: Some(span) }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Diagnostic { kind: DiagnosticKind::Runtime, message: message.into(), suggestion: None, span: None }
    }

    pub fn cycle(participants: Vec<String>) -> Self {
        let message = format!("cycle detected among formulas: {}", participants.join(", "));
        Diagnostic { kind: DiagnosticKind::Cycle { participants }, message, suggestion: None, span: None }
    }

    /// Attaches a "did you mean" suggestion drawn from a category-specific
    /// candidate list (falls back to the full known-word set if empty).
    pub fn with_suggestion(mut self, attempted: &str, candidates: &[&str]) -> Self {
        let pool: Vec<&str> = if candidates.is_empty() { keywords::all_known_words() } else { candidates.to_vec() };
        if let Some(word) = find_similar(attempted, &pool, 2) {
            self.suggestion = Some(word.to_string());
        }
        self
    }

    pub fn display_with_source(&self, source: &str) -> String {
        let Some(span) = self.span else {
            return format!("error[{:?}]: {}", self.kind, self.message);
        };
        let (line_num, line_start, line_content) = find_context(source, span);
        let col = span.start.saturating_sub(line_start);
        let len = (span.end.saturating_sub(span.start)).max(1);
        let underline = format!("{}{}", " ".repeat(col), "^".repeat(len));

        let mut result = format!(
            "error[{:?}]: {}\n\n{:4} | {}\n     | {}",
            self.kind, self.message, line_num, line_content, underline
        );

        if let Some(suggestion) = &self.suggestion {
            result.push_str(&format!("\n     | help: did you mean '{}'?", suggestion));
        }

        result
    }
}

fn find_context(source: &str, span: Span) -> (usize, usize, &str) {
    let mut line_num = 1;
    let mut line_start = 0;

    for (i, c) in source.char_indices() {
        if i >= span.start {
            break;
        }
        if c == '\n' {
            line_num += 1;
            line_start = i + 1;
        }
    }

    let line_end = source[line_start..]
        .find('\n')
        .map(|off| line_start + off)
        .unwrap_or(source.len());

    (line_num, line_start, &source[line_start..line_end])
}
