//! Batch evaluation (§4.5): a named collection of formulas, lexed and
//! parsed independently, ordered so every `@name` reference is evaluated
//! before its referrer, then run in order against one shared context so
//! later formulas can read earlier results out of the cache.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::arena::Arena;
use crate::ast::Expr;
use crate::astro::SunCalculator;
use crate::context::EvaluationContext;
use crate::error::Diagnostic;
use crate::executor;
use crate::intern::Interner;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::validator;
use crate::value::Value;

pub struct BatchResult {
    pub results: HashMap<String, Value>,
    pub errors: HashMap<String, Vec<Diagnostic>>,
    /// Present only when the batch as a whole was aborted by a reference
    /// cycle; names the formulas caught in it.
    pub cycle: Option<Vec<String>>,
}

/// Evaluates `formulas` (name -> source text) against one shared
/// evaluation context. A formula that fails to lex, parse, or validate is
/// recorded under its own name in `errors` and excluded from the
/// dependency graph entirely, so it cannot drag an otherwise-healthy
/// formula down with it. A reference cycle among the survivors aborts the
/// whole batch: per §4.5, no successfully-ordered prefix is evaluated once
/// a cycle is found, since any formula might transitively depend on it.
pub fn evaluate_batch(
    formulas: &[(String, String)],
    date: NaiveDate,
    latitude: f64,
    longitude: f64,
    elevation_m: f64,
    tz: Tz,
    calculator: &dyn SunCalculator,
) -> BatchResult {
    let mut interner = Interner::new();
    let arena: Arena<Expr<'_>> = Arena::new();
    let mut errors: HashMap<String, Vec<Diagnostic>> = HashMap::new();
    let mut parsed: Vec<(String, &Expr<'_>)> = Vec::new();

    for (name, source) in formulas {
        let (tokens, lex_errors) = Lexer::new(source).lex(&mut interner);
        if !lex_errors.is_empty() {
            errors.insert(name.clone(), lex_errors);
            continue;
        }
        let (root, parse_errors) = Parser::new(&tokens, &arena, &interner).parse();
        if !parse_errors.is_empty() || root.is_none() {
            errors.insert(name.clone(), parse_errors);
            continue;
        }
        parsed.push((name.clone(), root.unwrap()));
    }

    let available: HashSet<String> = parsed.iter().map(|(n, _)| n.clone()).collect();
    let mut validated: Vec<(String, &Expr<'_>)> = Vec::new();
    for (name, expr) in &parsed {
        let diags = validator::validate(expr, &interner, Some(name.as_str()), &available);
        if diags.is_empty() {
            validated.push((name.clone(), expr));
        } else {
            errors.insert(name.clone(), diags);
        }
    }

    let order = match validator::topo_sort(&validated, &interner) {
        Ok(order) => order,
        Err(participants) => {
            log::debug!("cycle detected among {} formulas", participants.len());
            let diag = Diagnostic::cycle(participants.clone());
            for p in &participants {
                errors.entry(p.clone()).or_default().push(diag.clone());
            }
            return BatchResult { results: HashMap::new(), errors, cycle: Some(participants) };
        }
    };
    log::debug!("topological order: {:?}", order);

    let by_name: HashMap<&str, &Expr<'_>> = validated.iter().map(|(n, e)| (n.as_str(), *e)).collect();
    let mut ctx = EvaluationContext::new(date, latitude, longitude, elevation_m, tz, calculator);
    let mut results = HashMap::new();

    for name in &order {
        let Some(expr) = by_name.get(name.as_str()) else { continue };
        log::trace!("evaluating formula '{name}'");
        match executor::evaluate(expr, &mut ctx, &interner) {
            Ok(value) => {
                if let Value::Time(_) = value {
                    ctx.cache_insert(name.clone(), value.clone());
                }
                results.insert(name.clone(), value);
            }
            Err(diag) => {
                log::debug!("formula '{name}' failed: {}", diag.message);
                errors.entry(name.clone()).or_default().push(diag);
            }
        }
    }

    BatchResult { results, errors, cycle: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::NoaaSunCalculator;

    fn run(formulas: &[(&str, &str)]) -> BatchResult {
        let calc = NoaaSunCalculator;
        let date = NaiveDate::from_ymd_opt(2024, 3, 21).unwrap();
        let owned: Vec<(String, String)> = formulas.iter().map(|(n, s)| (n.to_string(), s.to_string())).collect();
        evaluate_batch(&owned, date, 31.7683, 35.2137, 800.0, chrono_tz::Asia::Jerusalem, &calc)
    }

    #[test]
    fn independent_formulas_all_succeed() {
        let result = run(&[("a", "visible_sunrise"), ("b", "visible_sunset")]);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.results.len(), 2);
    }

    #[test]
    fn later_formula_references_earlier() {
        let result = run(&[("a", "visible_sunrise"), ("b", "@a + 10min")]);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        let a = result.results["a"].as_time().unwrap();
        let b = result.results["b"].as_time().unwrap();
        assert_eq!((b - a).num_minutes(), 10);
    }

    #[test]
    fn reference_order_independent_of_input_order() {
        let result = run(&[("b", "@a + 10min"), ("a", "visible_sunrise")]);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert!(result.results.contains_key("b"));
    }

    #[test]
    fn three_way_cycle_aborts_whole_batch() {
        let result = run(&[("a", "@b + 10min"), ("b", "@c + 10min"), ("c", "@a + 10min")]);
        assert!(result.results.is_empty());
        let cycle = result.cycle.expect("expected a cycle");
        assert_eq!(cycle.len(), 3);
    }

    #[test]
    fn bad_formula_is_isolated_from_healthy_ones() {
        let result = run(&[("a", "visible_sunrise"), ("b", "1 +")]);
        assert!(result.results.contains_key("a"));
        assert!(result.errors.contains_key("b"));
    }

    #[test]
    fn unknown_reference_is_a_validator_error_not_a_panic() {
        let result = run(&[("a", "@missing + 10min")]);
        assert!(result.errors.contains_key("a"));
        assert!(result.results.is_empty());
    }

    #[test]
    fn self_reference_is_a_semantic_error_not_a_degenerate_cycle() {
        let result = run(&[("a", "@a + 10min")]);
        assert!(result.cycle.is_none());
        assert!(result.errors.contains_key("a"));
        let diags = &result.errors["a"];
        assert!(diags.iter().any(|d| d.kind == crate::error::DiagnosticKind::Semantic));
        assert!(result.results.is_empty());
    }
}
