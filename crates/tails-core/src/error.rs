use crate::span::Span;

/// A compile-time failure: a message plus an optional source location.
///
/// Every parse, typing, and compiler-consistency failure is reported through
/// this one type; runtime failures have their own types in the VM crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileError {
    message: String,
    span: Option<Span>,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
        }
    }

    pub fn at(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span: Some(span),
        }
    }

    /// Attach a span if the error doesn't already carry one.
    pub fn with_span(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn span(&self) -> Option<Span> {
        self.span
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.span {
            Some(span) => write!(f, "{} (at offset {})", self.message, span.start().offset()),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for CompileError {}

pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Pos;

    #[test]
    fn display_with_and_without_span() {
        let plain = CompileError::new("oops");
        assert_eq!(plain.to_string(), "oops");

        let spanned = CompileError::at("oops", Span::new(Pos::new(4), Pos::new(7)));
        assert_eq!(spanned.to_string(), "oops (at offset 4)");
    }

    #[test]
    fn with_span_keeps_existing() {
        let err = CompileError::at("x", Span::at(Pos::new(1)));
        let err = err.with_span(Span::at(Pos::new(9)));
        assert_eq!(err.span().unwrap().start(), Pos::new(1));
    }
}
