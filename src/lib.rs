//! A small expression language for halachic zman formulas: lex, parse,
//! validate and evaluate a formula against an injected astronomical
//! collaborator. Four independent stages, each its own module —
//! [`lexer`], [`parser`], [`validator`], [`executor`] — composed by the
//! top-level functions below and by [`batch`] for named-formula sets.

pub mod arena;
pub mod ast;
pub mod astro;
pub mod batch;
#[cfg(feature = "cli")]
pub mod cli;
#[cfg(feature = "cli")]
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod intern;
pub mod keywords;
pub mod lexer;
pub mod parser;
pub mod suggest;
pub mod token;
pub mod validator;
pub mod value;

pub use ast::{Expr, ExprKind, ValueKind};
pub use astro::{NoaaSunCalculator, SunCalculator, SunTimes};
pub use batch::{evaluate_batch, BatchResult};
#[cfg(feature = "cli")]
pub use config::RunConfig;
pub use context::EvaluationContext;
pub use error::{Diagnostic, DiagnosticKind};
pub use intern::{Interner, Symbol, SymbolEq};
pub use token::{Span, Token, TokenType};
pub use value::Value;

use arena::Arena;
use chrono::NaiveDate;
use chrono_tz::Tz;

/// Lexes and parses `source` into a freshly-allocated expression tree.
/// The arena and interner must outlive the returned tree; construct them
/// in the caller and pass them in when the tree needs to survive the call.
pub fn parse_formula<'arena>(
    source: &str,
    arena: &'arena Arena<Expr<'arena>>,
    interner: &mut Interner,
) -> (Option<&'arena Expr<'arena>>, Vec<Diagnostic>) {
    let (tokens, lex_errors) = lexer::Lexer::new(source).lex(interner);
    if !lex_errors.is_empty() {
        return (None, lex_errors);
    }
    parser::Parser::new(&tokens, arena, interner).parse()
}

/// Runs the validator over an already-parsed tree. `current` is this
/// formula's own name, if it has one, so a self-reference can be caught
/// as a semantic error; `available` names the other formulas it may
/// reference by `@name`.
pub fn validate_formula(
    expr: &Expr<'_>,
    interner: &Interner,
    current: Option<&str>,
    available: &std::collections::HashSet<String>,
) -> Vec<Diagnostic> {
    validator::validate(expr, interner, current, available)
}

/// Parses, validates (against no other named formulas) and evaluates a
/// single self-contained formula in one call.
pub fn evaluate_formula(
    source: &str,
    date: NaiveDate,
    latitude: f64,
    longitude: f64,
    elevation_m: f64,
    tz: Tz,
    calculator: &dyn SunCalculator,
) -> Result<Value, Diagnostic> {
    let mut interner = Interner::new();
    let arena: Arena<Expr<'_>> = Arena::new();
    let (tokens, lex_errors) = lexer::Lexer::new(source).lex(&mut interner);
    if let Some(e) = lex_errors.into_iter().next() {
        return Err(e);
    }
    let (root, parse_errors) = parser::Parser::new(&tokens, &arena, &interner).parse();
    if let Some(e) = parse_errors.into_iter().next() {
        return Err(e);
    }
    let root = root.ok_or_else(|| Diagnostic::runtime("empty formula"))?;

    let available = std::collections::HashSet::new();
    if let Some(e) = validator::validate(root, &interner, None, &available).into_iter().next() {
        return Err(e);
    }

    let mut ctx = EvaluationContext::new(date, latitude, longitude, elevation_m, tz, calculator);
    executor::evaluate(root, &mut ctx, &interner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluate_formula_end_to_end() {
        let calc = NoaaSunCalculator;
        let date = NaiveDate::from_ymd_opt(2024, 3, 21).unwrap();
        let result = evaluate_formula(
            "visible_sunrise - 72min",
            date,
            31.7683,
            35.2137,
            800.0,
            chrono_tz::Asia::Jerusalem,
            &calc,
        );
        assert!(result.is_ok(), "{:?}", result);
    }

    #[test]
    fn evaluate_formula_surfaces_syntax_errors() {
        let calc = NoaaSunCalculator;
        let date = NaiveDate::from_ymd_opt(2024, 3, 21).unwrap();
        let result = evaluate_formula("1 +", date, 31.7683, 35.2137, 800.0, chrono_tz::Asia::Jerusalem, &calc);
        assert!(matches!(result, Err(e) if e.kind == DiagnosticKind::Syntax));
    }

    #[test]
    fn evaluate_formula_surfaces_semantic_errors() {
        let calc = NoaaSunCalculator;
        let date = NaiveDate::from_ymd_opt(2024, 3, 21).unwrap();
        let result = evaluate_formula("@missing", date, 31.7683, 35.2137, 800.0, chrono_tz::Asia::Jerusalem, &calc);
        assert!(matches!(result, Err(e) if e.kind == DiagnosticKind::Semantic));
    }

    #[test]
    fn parse_formula_reuses_caller_arena() {
        let mut interner = Interner::new();
        let arena: Arena<Expr<'_>> = Arena::new();
        let (root, errors) = parse_formula("visible_sunset + 18min", &arena, &mut interner);
        assert!(errors.is_empty());
        assert!(root.is_some());
    }
}
