//! Static semantic checks: function arity/argument kinds, arithmetic type
//! rules, conditional/comparison/logical typing, reference resolution and
//! cycle detection across a batch of named formulas. Plain recursive
//! functions over the tree, not a trait-based visitor — there is exactly
//! one tree shape to walk and no need for open extension here.

use std::collections::{HashMap, HashSet};

use crate::ast::{ArithOp, CompareOp, Expr, ExprKind, ValueKind};
use crate::error::Diagnostic;
use crate::intern::{Interner, Symbol};
use crate::keywords;

/// Validates a single formula's expression tree against the set of other
/// formula names it is allowed to reference. `current` is the name of the
/// formula being validated, if it has one (a batch formula does; a
/// one-off `eval`/`check` formula does not) — a `@name` reference equal
/// to `current` is a self-reference and is rejected before the
/// `available` lookup even runs. Returns every diagnostic found; an empty
/// vec means the tree is safe to evaluate.
pub fn validate(expr: &Expr<'_>, interner: &Interner, current: Option<&str>, available: &HashSet<String>) -> Vec<Diagnostic> {
    let mut errors = Vec::new();
    infer(expr, interner, current, available, &mut errors);
    errors
}

fn name(interner: &Interner, sym: Symbol) -> String {
    interner.resolve(sym).to_string()
}

/// Infers the coarse value type of `expr`, reporting every static error
/// found along the way. Returns `None` once an error has made the type
/// unknowable, so callers don't cascade a second error off a first.
fn infer(
    expr: &Expr<'_>,
    interner: &Interner,
    current: Option<&str>,
    available: &HashSet<String>,
    errors: &mut Vec<Diagnostic>,
) -> Option<ValueKind> {
    match &expr.kind {
        ExprKind::Primitive { .. } => Some(ValueKind::Time),
        ExprKind::NumberLit { .. } => Some(ValueKind::Number),
        ExprKind::DurationLit { .. } => Some(ValueKind::Duration),
        ExprKind::StringLit { .. } => Some(ValueKind::String),

        ExprKind::DateLiteral { day, month } => {
            if !(1..=12).contains(month) || !(1..=days_in_month(*month)).contains(day) {
                errors.push(Diagnostic::semantic(format!("{day}-{month} is not a valid day/month combination"), expr.span));
                return None;
            }
            // A date literal only has meaning compared against `date`; it
            // carries no independent `ValueKind` of its own.
            None
        }

        ExprKind::ConditionVar { name: sym } => match name(interner, *sym).as_str() {
            "latitude" | "longitude" | "month" | "day" | "day_of_year" | "date" => Some(ValueKind::Number),
            "day_length" => Some(ValueKind::Duration),
            "season" => Some(ValueKind::String),
            other => {
                errors.push(Diagnostic::semantic(format!("unknown condition variable '{other}'"), expr.span));
                None
            }
        },

        ExprKind::Reference { key } => {
            let key_str = name(interner, *key);
            if current == Some(key_str.as_str()) {
                errors.push(Diagnostic::semantic(format!("formula '{key_str}' cannot reference itself"), expr.span));
                None
            } else if available.contains(&key_str) {
                Some(ValueKind::Time)
            } else {
                let candidates: Vec<&str> = available.iter().map(String::as_str).collect();
                errors.push(
                    Diagnostic::semantic(format!("reference to unknown formula '@{key_str}'"), expr.span)
                        .with_suggestion(&key_str, &candidates),
                );
                None
            }
        }

        ExprKind::Direction { name: sym } => {
            errors.push(Diagnostic::semantic(
                format!("'{}' is a direction and can only appear as a function argument", name(interner, *sym)),
                expr.span,
            ));
            None
        }

        ExprKind::Base { name: sym, .. } => {
            errors.push(Diagnostic::semantic(
                format!("'{}' is a base and can only appear as the second argument of proportional_hours", name(interner, *sym)),
                expr.span,
            ));
            None
        }

        ExprKind::BinaryOp { op, left, right } => {
            let lk = infer(left, interner, current, available, errors);
            let rk = infer(right, interner, current, available, errors);
            let (Some(lk), Some(rk)) = (lk, rk) else { return None };
            check_arithmetic(*op, lk, rk, expr, errors)
        }

        ExprKind::Function { name: sym, args } => validate_function(*sym, args, expr, interner, current, available, errors),

        ExprKind::Conditional { cond, true_branch, false_branch } => {
            validate_condition(cond, interner, current, available, errors);
            let tk = infer(true_branch, interner, current, available, errors);
            let fk = false_branch.and_then(|b| infer(b, interner, current, available, errors));
            match (tk, fk) {
                (Some(t), Some(f)) if t != f => {
                    errors.push(Diagnostic::semantic(
                        format!("if/else branches have different types ({t:?} vs {f:?})"),
                        expr.span,
                    ));
                    None
                }
                (Some(t), _) => Some(t),
                (None, _) => None,
            }
        }

        // Reachable only if a comparison/logical/not node ends up nested
        // inside an arithmetic position (e.g. `(lat > 50) + 1`); the
        // condition grammar otherwise keeps these out of `infer`'s callers.
        ExprKind::Comparison { .. } | ExprKind::LogicalOp { .. } | ExprKind::Not { .. } => {
            validate_condition(expr, interner, current, available, errors);
            Some(ValueKind::Boolean)
        }
    }
}

fn check_arithmetic(op: ArithOp, lk: ValueKind, rk: ValueKind, expr: &Expr<'_>, errors: &mut Vec<Diagnostic>) -> Option<ValueKind> {
    use ValueKind::*;
    let result = match (op, lk, rk) {
        (ArithOp::Add, Time, Duration) | (ArithOp::Add, Duration, Time) => Some(Time),
        (ArithOp::Add, Duration, Duration) => Some(Duration),
        (ArithOp::Add, Number, Number) => Some(Number),
        (ArithOp::Sub, Time, Duration) => Some(Time),
        (ArithOp::Sub, Time, Time) => Some(Duration),
        (ArithOp::Sub, Duration, Duration) => Some(Duration),
        (ArithOp::Sub, Number, Number) => Some(Number),
        (ArithOp::Mul, Duration, Number) | (ArithOp::Mul, Number, Duration) => Some(Duration),
        (ArithOp::Mul, Number, Number) => Some(Number),
        (ArithOp::Div, Duration, Number) => Some(Duration),
        (ArithOp::Div, Number, Number) => Some(Number),
        _ => None,
    };
    if result.is_none() {
        let suggestion = if matches!(op, ArithOp::Add) && lk == Time && rk == Time {
            " (did you mean time2 - time1?)"
        } else {
            ""
        };
        errors.push(Diagnostic::semantic(format!("cannot apply {op:?} to {lk:?} and {rk:?}{suggestion}"), expr.span));
    }
    result
}

fn validate_condition(
    expr: &Expr<'_>,
    interner: &Interner,
    current: Option<&str>,
    available: &HashSet<String>,
    errors: &mut Vec<Diagnostic>,
) {
    match &expr.kind {
        ExprKind::Comparison { op, left, right } => {
            let lk = infer(left, interner, current, available, errors);
            let rk = infer(right, interner, current, available, errors);
            if let (Some(lk), Some(rk)) = (lk, rk) {
                if lk != rk {
                    errors.push(Diagnostic::semantic(format!("cannot compare {lk:?} with {rk:?}"), expr.span));
                } else if matches!(op, CompareOp::Gt | CompareOp::Lt | CompareOp::Gte | CompareOp::Lte)
                    && !matches!(lk, ValueKind::Number | ValueKind::Time | ValueKind::Duration)
                {
                    errors.push(Diagnostic::semantic(format!("{lk:?} does not support ordering comparisons"), expr.span));
                }
            }
            // `date == 21-May` style comparisons: a date literal operand is
            // only valid against the `date` condition variable.
            if is_date_literal(left) || is_date_literal(right) {
                let other = if is_date_literal(left) { right } else { left };
                if !matches!(op, CompareOp::Eq | CompareOp::Neq) || !is_date_condition_var(other, interner) {
                    errors.push(Diagnostic::semantic(
                        "a date literal may only be compared to `date` with == or !=",
                        expr.span,
                    ));
                }
            }
        }
        ExprKind::LogicalOp { left, right, .. } => {
            validate_condition(left, interner, current, available, errors);
            validate_condition(right, interner, current, available, errors);
        }
        ExprKind::Not { operand } => validate_condition(operand, interner, current, available, errors),
        _ => {
            let kind = infer(expr, interner, current, available, errors);
            errors.push(Diagnostic::semantic(
                format!("expected a comparison or logical condition, found {kind:?}"),
                expr.span,
            ));
        }
    }
}

fn is_date_literal(expr: &Expr<'_>) -> bool {
    matches!(expr.kind, ExprKind::DateLiteral { .. })
}

fn is_date_condition_var(expr: &Expr<'_>, interner: &Interner) -> bool {
    matches!(&expr.kind, ExprKind::ConditionVar { name: sym } if name(interner, *sym) == "date")
}

fn validate_function(
    sym: Symbol,
    args: &[&Expr<'_>],
    expr: &Expr<'_>,
    interner: &Interner,
    current: Option<&str>,
    available: &HashSet<String>,
    errors: &mut Vec<Diagnostic>,
) -> Option<ValueKind> {
    let fname = name(interner, sym);
    match fname.as_str() {
        "solar" => {
            require_arity(&fname, args, 2, expr, errors)?;
            check_number_range(args[0], 0.0, 90.0, interner, errors);
            check_direction(args[1], keywords::DIRECTIONS, interner, errors);
            infer(args[0], interner, current, available, errors);
            Some(ValueKind::Time)
        }
        "seasonal_solar" => {
            require_arity(&fname, args, 2, expr, errors)?;
            check_number_range(args[0], 0.0, 90.0, interner, errors);
            check_direction(args[1], keywords::SUN_EVENT_DIRECTIONS, interner, errors);
            infer(args[0], interner, current, available, errors);
            Some(ValueKind::Time)
        }
        "proportional_hours" => {
            require_arity(&fname, args, 2, expr, errors)?;
            check_number_range(args[0], 0.5, 12.0, interner, errors);
            check_base(args[1], interner, current, available, errors);
            infer(args[0], interner, current, available, errors);
            Some(ValueKind::Time)
        }
        "proportional_minutes" => {
            require_arity(&fname, args, 2, expr, errors)?;
            check_number_range(args[0], f64::MIN_POSITIVE, 200.0, interner, errors);
            check_direction(args[1], keywords::SUN_EVENT_DIRECTIONS, interner, errors);
            infer(args[0], interner, current, available, errors);
            Some(ValueKind::Time)
        }
        "midpoint" | "earlier_of" | "later_of" => {
            require_arity(&fname, args, 2, expr, errors)?;
            for a in args {
                require_time(a, interner, current, available, errors);
            }
            Some(ValueKind::Time)
        }
        "first_valid" => {
            if args.len() < 2 {
                errors.push(Diagnostic::semantic(format!("{fname} requires at least 2 arguments, found {}", args.len()), expr.span));
                return None;
            }
            for a in args {
                require_time(a, interner, current, available, errors);
            }
            Some(ValueKind::Time)
        }
        other => {
            errors.push(
                Diagnostic::semantic(format!("unknown function '{other}'"), expr.span).with_suggestion(other, keywords::FUNCTIONS),
            );
            None
        }
    }
}

fn require_arity(fname: &str, args: &[&Expr<'_>], expected: usize, expr: &Expr<'_>, errors: &mut Vec<Diagnostic>) -> Option<()> {
    if args.len() != expected {
        errors.push(Diagnostic::semantic(
            format!("{fname} expects {expected} arguments, found {}", args.len()),
            expr.span,
        ));
        None
    } else {
        Some(())
    }
}

fn require_time(arg: &Expr<'_>, interner: &Interner, current: Option<&str>, available: &HashSet<String>, errors: &mut Vec<Diagnostic>) {
    match infer(arg, interner, current, available, errors) {
        Some(ValueKind::Time) | None => {}
        Some(other) => errors.push(Diagnostic::semantic(format!("expected a time value, found {other:?}"), arg.span)),
    }
}

fn check_number_range(arg: &Expr<'_>, min: f64, max: f64, _interner: &Interner, errors: &mut Vec<Diagnostic>) {
    if let ExprKind::NumberLit { value } = &arg.kind {
        if *value < min || *value > max {
            errors.push(Diagnostic::semantic(format!("{value} is outside the valid range [{min}, {max}]"), arg.span));
        }
    } else if !matches!(arg.kind, ExprKind::ConditionVar { .. } | ExprKind::Reference { .. } | ExprKind::BinaryOp { .. }) {
        errors.push(Diagnostic::semantic("expected a numeric value", arg.span));
    }
}

fn check_direction(arg: &Expr<'_>, allowed: &[&str], interner: &Interner, errors: &mut Vec<Diagnostic>) {
    match &arg.kind {
        ExprKind::Direction { name: sym } => {
            let dname = name(interner, *sym);
            if !allowed.contains(&dname.as_str()) {
                errors.push(
                    Diagnostic::semantic(format!("'{dname}' is not a valid direction here"), arg.span).with_suggestion(&dname, allowed),
                );
            }
        }
        _ => errors.push(Diagnostic::semantic("expected a direction", arg.span)),
    }
}

fn check_base(arg: &Expr<'_>, interner: &Interner, current: Option<&str>, available: &HashSet<String>, errors: &mut Vec<Diagnostic>) {
    match &arg.kind {
        ExprKind::Base { name: sym, custom_args } => {
            let bname = name(interner, *sym);
            if bname == "custom" {
                let Some((start, end)) = custom_args else {
                    errors.push(Diagnostic::semantic("custom base requires (start, end) arguments", arg.span));
                    return;
                };
                require_time(start, interner, current, available, errors);
                require_time(end, interner, current, available, errors);
            } else if !keywords::is_base(&bname) {
                errors.push(Diagnostic::semantic(format!("unknown base '{bname}'"), arg.span).with_suggestion(&bname, keywords::BASES));
            }
        }
        _ => errors.push(Diagnostic::semantic("expected a base", arg.span)),
    }
}

fn days_in_month(month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => 29, // leap-year validity is resolved against a real year at runtime
        _ => 0,
    }
}

/// Collects every `@name` reference reachable from `expr`.
fn collect_references(expr: &Expr<'_>, interner: &Interner, out: &mut Vec<String>) {
    match &expr.kind {
        ExprKind::Reference { key } => out.push(name(interner, *key)),
        ExprKind::BinaryOp { left, right, .. } | ExprKind::Comparison { left, right, .. } | ExprKind::LogicalOp { left, right, .. } => {
            collect_references(left, interner, out);
            collect_references(right, interner, out);
        }
        ExprKind::Not { operand } => collect_references(operand, interner, out),
        ExprKind::Conditional { cond, true_branch, false_branch } => {
            collect_references(cond, interner, out);
            collect_references(true_branch, interner, out);
            if let Some(f) = false_branch {
                collect_references(f, interner, out);
            }
        }
        ExprKind::Function { args, .. } => {
            for a in *args {
                collect_references(a, interner, out);
            }
        }
        ExprKind::Base { custom_args: Some((s, e)), .. } => {
            collect_references(s, interner, out);
            collect_references(e, interner, out);
        }
        _ => {}
    }
}

/// Topologically orders a batch of named formulas via Kahn's algorithm.
/// On success, returns formula names in dependency order (referenced
/// formulas before their referrers). On a cycle, returns the names still
/// stuck with nonzero in-degree once no more nodes can be removed.
pub fn topo_sort(formulas: &[(String, &Expr<'_>)], interner: &Interner) -> Result<Vec<String>, Vec<String>> {
    let names: HashSet<&str> = formulas.iter().map(|(n, _)| n.as_str()).collect();

    let mut deps: HashMap<&str, Vec<String>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    for (fname, _) in formulas {
        in_degree.entry(fname.as_str()).or_insert(0);
    }

    for (fname, expr) in formulas {
        let mut refs = Vec::new();
        collect_references(expr, interner, &mut refs);
        refs.retain(|r| names.contains(r.as_str()));
        for _ in &refs {
            *in_degree.entry(fname.as_str()).or_insert(0) += 1;
        }
        deps.insert(fname.as_str(), refs);
    }

    // Build forward edges (dependency -> dependent) for propagation.
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for (fname, refs) in &deps {
        for r in refs {
            dependents.entry(names.get(r.as_str()).copied().unwrap_or(r.as_str())).or_default().push(fname);
        }
    }

    let mut queue: Vec<&str> = in_degree.iter().filter(|(_, d)| **d == 0).map(|(n, _)| *n).collect();
    queue.sort();
    let mut order = Vec::new();
    let mut remaining = in_degree.clone();

    while let Some(n) = queue.pop() {
        order.push(n.to_string());
        if let Some(deps) = dependents.get(n) {
            let mut next_ready = Vec::new();
            for d in deps {
                if let Some(count) = remaining.get_mut(d) {
                    *count -= 1;
                    if *count == 0 {
                        next_ready.push(*d);
                    }
                }
            }
            next_ready.sort();
            queue.extend(next_ready);
        }
        queue.sort();
    }

    if order.len() == formulas.len() {
        Ok(order)
    } else {
        let mut stuck: Vec<String> = remaining.iter().filter(|(_, d)| **d > 0).map(|(n, _)| n.to_string()).collect();
        stuck.sort();
        Err(stuck)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn build<'a>(source: &str, arena: &'a Arena<Expr<'a>>, interner: &mut Interner) -> &'a Expr<'a> {
        let (tokens, lex_errors) = Lexer::new(source).lex(interner);
        assert!(lex_errors.is_empty(), "{:?}", lex_errors);
        let (root, parse_errors) = Parser::new(&tokens, arena, interner).parse();
        assert!(parse_errors.is_empty(), "{:?}", parse_errors);
        root.unwrap()
    }

    #[test]
    fn valid_primitive_minus_duration_has_no_errors() {
        let mut interner = Interner::new();
        let arena: Arena<Expr<'_>> = Arena::new();
        let expr = build("visible_sunrise - 72min", &arena, &mut interner);
        let errors = validate(expr, &interner, None, &HashSet::new());
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn time_plus_time_reports_suggestion() {
        let mut interner = Interner::new();
        let arena: Arena<Expr<'_>> = Arena::new();
        let expr = build("visible_sunrise + visible_sunset", &arena, &mut interner);
        let errors = validate(expr, &interner, None, &HashSet::new());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("time2 - time1"));
    }

    #[test]
    fn unknown_reference_gets_suggestion() {
        let mut interner = Interner::new();
        let arena: Arena<Expr<'_>> = Arena::new();
        let expr = build("@mincha_ketana", &arena, &mut interner);
        let mut available = HashSet::new();
        available.insert("mincha_ketana_gra".to_string());
        let errors = validate(expr, &interner, None, &available);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn self_reference_is_a_semantic_error_not_a_cycle() {
        let mut interner = Interner::new();
        let arena: Arena<Expr<'_>> = Arena::new();
        let expr = build("@a + 10min", &arena, &mut interner);
        let mut available = HashSet::new();
        available.insert("a".to_string());
        let errors = validate(expr, &interner, Some("a"), &available);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, crate::error::DiagnosticKind::Semantic);
        assert!(errors[0].message.contains("cannot reference itself"));
    }

    #[test]
    fn out_of_range_solar_degrees_is_error() {
        let mut interner = Interner::new();
        let arena: Arena<Expr<'_>> = Arena::new();
        let expr = build("solar(120, before_visible_sunrise)", &arena, &mut interner);
        let errors = validate(expr, &interner, None, &HashSet::new());
        assert!(!errors.is_empty());
    }

    #[test]
    fn seasonal_solar_rejects_noon_direction() {
        let mut interner = Interner::new();
        let arena: Arena<Expr<'_>> = Arena::new();
        let expr = build("seasonal_solar(16, before_noon)", &arena, &mut interner);
        let errors = validate(expr, &interner, None, &HashSet::new());
        assert!(!errors.is_empty());
    }

    #[test]
    fn proportional_hours_accepts_named_base() {
        let mut interner = Interner::new();
        let arena: Arena<Expr<'_>> = Arena::new();
        let expr = build("proportional_hours(3, gra)", &arena, &mut interner);
        let errors = validate(expr, &interner, None, &HashSet::new());
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn custom_base_requires_time_args() {
        let mut interner = Interner::new();
        let arena: Arena<Expr<'_>> = Arena::new();
        let expr = build("proportional_hours(3, custom(visible_sunrise, visible_sunset))", &arena, &mut interner);
        let errors = validate(expr, &interner, None, &HashSet::new());
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn if_else_branch_type_mismatch_is_error() {
        let mut interner = Interner::new();
        let arena: Arena<Expr<'_>> = Arena::new();
        let expr = build("if (latitude > 30) { visible_sunrise } else { 5 }", &arena, &mut interner);
        let errors = validate(expr, &interner, None, &HashSet::new());
        assert!(!errors.is_empty());
    }

    #[test]
    fn bare_expression_condition_is_error() {
        let mut interner = Interner::new();
        let arena: Arena<Expr<'_>> = Arena::new();
        let expr = build("if (month) { visible_sunrise } else { visible_sunset }", &arena, &mut interner);
        let errors = validate(expr, &interner, None, &HashSet::new());
        assert!(!errors.is_empty());
    }

    #[test]
    fn topo_sort_orders_dependencies_first() {
        let mut interner = Interner::new();
        let arena: Arena<Expr<'_>> = Arena::new();
        let a = build("visible_sunrise", &arena, &mut interner);
        let b = build("@a - 10min", &arena, &mut interner);
        let formulas = vec![("b".to_string(), b), ("a".to_string(), a)];
        let order = topo_sort(&formulas, &interner).unwrap();
        assert_eq!(order, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn topo_sort_detects_cycle() {
        let mut interner = Interner::new();
        let arena: Arena<Expr<'_>> = Arena::new();
        let a = build("@b", &arena, &mut interner);
        let b = build("@a", &arena, &mut interner);
        let formulas = vec![("a".to_string(), a), ("b".to_string(), b)];
        let err = topo_sort(&formulas, &interner).unwrap_err();
        assert_eq!(err, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn topo_sort_detects_self_reference() {
        let mut interner = Interner::new();
        let arena: Arena<Expr<'_>> = Arena::new();
        let a = build("@a", &arena, &mut interner);
        let formulas = vec![("a".to_string(), a)];
        let err = topo_sort(&formulas, &interner).unwrap_err();
        assert_eq!(err, vec!["a".to_string()]);
    }
}
