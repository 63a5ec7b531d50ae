//! Tree-walking evaluator (§4.4). One function per node kind, not a
//! trait-based visitor — the tree has a single fixed shape and a single
//! walker per concern (this module; `validator` is the other).

use chrono::{DateTime, Datelike, Duration as ChronoDuration};
use chrono_tz::Tz;

use crate::ast::{ArithOp, CompareOp, Expr, ExprKind, LogicalOp};
use crate::context::EvaluationContext;
use crate::error::Diagnostic;
use crate::intern::Interner;
use crate::value::{self, Value};

enum Side {
    Dawn,
    Dusk,
}

pub fn evaluate(expr: &Expr<'_>, ctx: &mut EvaluationContext<'_>, interner: &Interner) -> Result<Value, Diagnostic> {
    match &expr.kind {
        ExprKind::Primitive { name } => eval_primitive(interner.resolve(*name), ctx),
        ExprKind::NumberLit { value } => Ok(Value::Number(*value)),
        ExprKind::DurationLit { minutes, .. } => Ok(Value::Duration(*minutes)),
        ExprKind::StringLit { value } => Ok(Value::String(interner.resolve(*value).to_string())),

        ExprKind::DateLiteral { day, month } => {
            let year = ctx.date.year();
            let Some(date) = chrono::NaiveDate::from_ymd_opt(year, *month, *day) else {
                return Err(Diagnostic::runtime(format!("{day}-{month} is not a valid date in {year}")));
            };
            // Normalised to day-of-year against the context's year, matching
            // the `date`/`day_of_year` condition variables (§9).
            Ok(Value::Number(date.ordinal() as f64))
        }

        ExprKind::ConditionVar { name } => match interner.resolve(*name) {
            "latitude" => Ok(Value::Number(ctx.latitude)),
            "longitude" => Ok(Value::Number(ctx.longitude)),
            "day_length" => Ok(Value::Duration(ctx.sun_times().day_length_minutes)),
            "month" => Ok(Value::Number(ctx.month() as f64)),
            "day" => Ok(Value::Number(ctx.day() as f64)),
            "day_of_year" => Ok(Value::Number(ctx.day_of_year() as f64)),
            "date" => Ok(Value::Number(ctx.day_of_year() as f64)),
            "season" => Ok(Value::String(ctx.season().to_string())),
            other => Err(Diagnostic::runtime(format!("unknown condition variable '{other}'"))),
        },

        ExprKind::Reference { key } => {
            let name = interner.resolve(*key);
            match ctx.cache_get(name).cloned() {
                Some(value) => {
                    log::trace!("cache hit for reference '@{name}'");
                    Ok(value)
                }
                None => {
                    log::trace!("cache miss for reference '@{name}'");
                    Err(Diagnostic::runtime(format!("missing reference '@{name}' at evaluation")))
                }
            }
        }

        ExprKind::BinaryOp { op, left, right } => {
            let l = evaluate(left, ctx, interner)?;
            let r = evaluate(right, ctx, interner)?;
            match op {
                ArithOp::Add => value::add(&l, &r),
                ArithOp::Sub => value::sub(&l, &r),
                ArithOp::Mul => value::mul(&l, &r),
                ArithOp::Div => value::div(&l, &r),
            }
        }

        ExprKind::Comparison { op, left, right } => {
            let l = evaluate(left, ctx, interner)?;
            let r = evaluate(right, ctx, interner)?;
            eval_comparison(*op, &l, &r)
        }

        ExprKind::LogicalOp { op, left, right } => {
            let l = evaluate(left, ctx, interner)?.as_boolean().ok_or_else(|| Diagnostic::runtime("logical operand is not boolean"))?;
            match op {
                LogicalOp::And if !l => Ok(Value::Boolean(false)),
                LogicalOp::Or if l => Ok(Value::Boolean(true)),
                _ => {
                    let r =
                        evaluate(right, ctx, interner)?.as_boolean().ok_or_else(|| Diagnostic::runtime("logical operand is not boolean"))?;
                    Ok(Value::Boolean(r))
                }
            }
        }

        ExprKind::Not { operand } => {
            let v = evaluate(operand, ctx, interner)?.as_boolean().ok_or_else(|| Diagnostic::runtime("'!' operand is not boolean"))?;
            Ok(Value::Boolean(!v))
        }

        ExprKind::Conditional { cond, true_branch, false_branch } => {
            let c = evaluate(cond, ctx, interner)?.as_boolean().ok_or_else(|| Diagnostic::runtime("condition is not boolean"))?;
            if c {
                evaluate(true_branch, ctx, interner)
            } else if let Some(f) = false_branch {
                evaluate(f, ctx, interner)
            } else {
                Err(Diagnostic::runtime("conditional is false with no else branch"))
            }
        }

        ExprKind::Function { name, args } => eval_function(interner.resolve(*name), args, ctx, interner),

        ExprKind::Direction { .. } | ExprKind::Base { .. } => {
            Err(Diagnostic::runtime("direction/base cannot be evaluated outside a function argument"))
        }
    }
}

fn eval_comparison(op: CompareOp, left: &Value, right: &Value) -> Result<Value, Diagnostic> {
    use std::cmp::Ordering;
    let ordering = match (left, right) {
        (Value::Time(a), Value::Time(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Value::Duration(a), Value::Duration(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) if matches!(op, CompareOp::Eq | CompareOp::Neq) => {
            return Ok(Value::Boolean(if matches!(op, CompareOp::Eq) { a == b } else { a != b }))
        }
        (Value::Boolean(a), Value::Boolean(b)) if matches!(op, CompareOp::Eq | CompareOp::Neq) => {
            return Ok(Value::Boolean(if matches!(op, CompareOp::Eq) { a == b } else { a != b }))
        }
        _ => return Err(Diagnostic::runtime(format!("cannot compare {:?} with {:?}", left.kind(), right.kind()))),
    };
    let result = match op {
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Gte => ordering != Ordering::Less,
        CompareOp::Lte => ordering != Ordering::Greater,
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Neq => ordering != Ordering::Equal,
    };
    Ok(Value::Boolean(result))
}

fn eval_primitive(name: &str, ctx: &mut EvaluationContext<'_>) -> Result<Value, Diagnostic> {
    if let Some(v) = ctx.cache_get(name) {
        return Ok(v.clone());
    }
    let value = match name {
        "visible_sunrise" | "sunrise" => Value::Time(ctx.sun_times().sunrise),
        "visible_sunset" | "sunset" => Value::Time(ctx.sun_times().sunset),
        "geometric_sunrise" => ctx.sun_time_at_angle(0.0).0,
        "geometric_sunset" => ctx.sun_time_at_angle(0.0).1,
        "solar_noon" => Value::Time(ctx.sun_times().solar_noon),
        "solar_midnight" => {
            let noon = ctx.sun_times().solar_noon;
            Value::Time(noon - ChronoDuration::hours(12))
        }
        "civil_dawn" => ctx.sun_time_at_angle(6.0).0,
        "civil_dusk" => ctx.sun_time_at_angle(6.0).1,
        "nautical_dawn" => ctx.sun_time_at_angle(12.0).0,
        "nautical_dusk" => ctx.sun_time_at_angle(12.0).1,
        "astronomical_dawn" => ctx.sun_time_at_angle(18.0).0,
        "astronomical_dusk" => ctx.sun_time_at_angle(18.0).1,
        other => return Err(Diagnostic::runtime(format!("unknown primitive '{other}'"))),
    };
    ctx.cache_insert(name.to_string(), value.clone());
    Ok(value)
}

fn direction_side(name: &str) -> Side {
    if name.starts_with("before_") {
        Side::Dawn
    } else if name.starts_with("after_") && name.ends_with("sunrise") {
        Side::Dawn
    } else {
        Side::Dusk
    }
}

fn canonical_direction(name: &str) -> &str {
    match name {
        "before_sunrise" => "before_visible_sunrise",
        "after_sunrise" => "after_visible_sunrise",
        "after_sunset" => "after_visible_sunset",
        other => other,
    }
}

fn direction_name<'a>(arg: &Expr<'_>, interner: &'a Interner) -> Result<&'a str, Diagnostic> {
    match &arg.kind {
        ExprKind::Direction { name } => Ok(canonical_direction(interner.resolve(*name))),
        _ => Err(Diagnostic::runtime("expected a direction argument")),
    }
}

fn sun_event_reference(ctx: &mut EvaluationContext<'_>, name: &str) -> Result<(DateTime<Tz>, bool), Diagnostic> {
    match name {
        "before_visible_sunrise" => Ok((ctx.sun_times().sunrise, true)),
        "after_visible_sunset" => Ok((ctx.sun_times().sunset, false)),
        "before_geometric_sunrise" => {
            let (dawn, _) = ctx.sun_time_at_angle(0.0);
            Ok((dawn.as_time().expect("sun_time_at_angle returns Time"), true))
        }
        "after_geometric_sunset" => {
            let (_, dusk) = ctx.sun_time_at_angle(0.0);
            Ok((dusk.as_time().expect("sun_time_at_angle returns Time"), false))
        }
        other => Err(Diagnostic::runtime(format!("'{other}' is not valid for proportional_minutes"))),
    }
}

fn eval_function(name: &str, args: &[&Expr<'_>], ctx: &mut EvaluationContext<'_>, interner: &Interner) -> Result<Value, Diagnostic> {
    match name {
        "solar" => {
            let degrees = evaluate(args[0], ctx, interner)?.as_number().ok_or_else(|| Diagnostic::runtime("expected a number"))?;
            let dir = direction_name(args[1], interner)?;
            let key = format!("solar({degrees}, {dir})");
            if let Some(v) = ctx.cache_get(&key) {
                return Ok(v.clone());
            }
            let (dawn, dusk) = ctx.sun_time_at_angle_with_elevation(degrees);
            let result = match direction_side(dir) {
                Side::Dawn => dawn,
                Side::Dusk => dusk,
            };
            ctx.cache_insert(key, result.clone());
            Ok(result)
        }
        "seasonal_solar" => {
            let degrees = evaluate(args[0], ctx, interner)?.as_number().ok_or_else(|| Diagnostic::runtime("expected a number"))?;
            let dir = direction_name(args[1], interner)?;
            let key = format!("seasonal_solar({degrees}, {dir})");
            if let Some(v) = ctx.cache_get(&key) {
                return Ok(v.clone());
            }
            let (dawn, dusk) = ctx.seasonal_sun_time_at_angle(degrees);
            let result = match direction_side(dir) {
                Side::Dawn => dawn,
                Side::Dusk => dusk,
            };
            ctx.cache_insert(key, result.clone());
            Ok(result)
        }
        "proportional_hours" => {
            let hours = evaluate(args[0], ctx, interner)?.as_number().ok_or_else(|| Diagnostic::runtime("expected a number"))?;
            let (start, end) = base_bounds(args[1], ctx, interner)?;
            let day = value::sub(&end, &start)?;
            let day_minutes = day.as_duration_minutes().ok_or_else(|| Diagnostic::runtime("base day-length is not a duration"))?;
            if day_minutes <= 0.0 {
                return Err(Diagnostic::runtime("base day-start is not strictly before day-end"));
            }
            let offset = value::mul(&Value::Duration(day_minutes / 12.0), &Value::Number(hours))?;
            value::add(&start, &offset)
        }
        "proportional_minutes" => {
            let minutes = evaluate(args[0], ctx, interner)?.as_number().ok_or_else(|| Diagnostic::runtime("expected a number"))?;
            let dir = direction_name(args[1], interner)?.to_string();
            let factor = minutes / 720.0;
            let day_length = ctx.sun_times().day_length_minutes;
            let offset = factor * day_length;
            let (reference, is_before) = sun_event_reference(ctx, &dir)?;
            let delta = ChronoDuration::milliseconds((offset * 60_000.0) as i64);
            Ok(Value::Time(if is_before { reference - delta } else { reference + delta }))
        }
        "midpoint" => {
            let a = evaluate(args[0], ctx, interner)?.as_time().ok_or_else(|| Diagnostic::runtime("expected a time"))?;
            let b = evaluate(args[1], ctx, interner)?.as_time().ok_or_else(|| Diagnostic::runtime("expected a time"))?;
            Ok(Value::Time(a + (b - a) / 2))
        }
        "earlier_of" | "later_of" => {
            let a = evaluate(args[0], ctx, interner)?;
            let b = evaluate(args[1], ctx, interner)?;
            if a.is_zero_instant() && b.is_zero_instant() {
                return Err(Diagnostic::runtime(format!("{name}: both operands are zero instants")));
            }
            if a.is_zero_instant() {
                return Ok(b);
            }
            if b.is_zero_instant() {
                return Ok(a);
            }
            let (ta, tb) = (a.as_time().ok_or_else(|| Diagnostic::runtime("expected a time"))?, b.as_time().ok_or_else(|| Diagnostic::runtime("expected a time"))?);
            let pick_a = if name == "earlier_of" { ta <= tb } else { ta >= tb };
            Ok(Value::Time(if pick_a { ta } else { tb }))
        }
        "first_valid" => {
            for a in args {
                match evaluate(a, ctx, interner) {
                    Ok(v) if !v.is_zero_instant() => return Ok(v),
                    _ => continue,
                }
            }
            Err(Diagnostic::runtime("first_valid: no argument produced a valid value"))
        }
        other => Err(Diagnostic::runtime(format!("unknown function '{other}'")).with_suggestion(other, crate::keywords::FUNCTIONS)),
    }
}

fn base_bounds(base_expr: &Expr<'_>, ctx: &mut EvaluationContext<'_>, interner: &Interner) -> Result<(Value, Value), Diagnostic> {
    let ExprKind::Base { name, custom_args } = &base_expr.kind else {
        return Err(Diagnostic::runtime("expected a base"));
    };
    let bname = interner.resolve(*name);
    if bname == "custom" {
        let (s, e) = custom_args.ok_or_else(|| Diagnostic::runtime("custom base requires (start, end)"))?;
        return Ok((evaluate(s, ctx, interner)?, evaluate(e, ctx, interner)?));
    }

    let times = ctx.sun_times();
    let fixed = |minutes: f64| {
        let delta = ChronoDuration::milliseconds((minutes * 60_000.0) as i64);
        (Value::Time(times.sunrise - delta), Value::Time(times.sunset + delta))
    };

    Ok(match bname {
        "gra" => (Value::Time(times.sunrise), Value::Time(times.sunset)),
        "mga" | "mga_72" => fixed(72.0),
        "mga_60" => fixed(60.0),
        "mga_90" => fixed(90.0),
        "mga_96" => fixed(96.0),
        "mga_120" => fixed(120.0),
        "mga_72_zmanis" => fixed(times.day_length_minutes / 10.0),
        "mga_90_zmanis" => fixed(times.day_length_minutes / 8.0),
        "mga_96_zmanis" => fixed(times.day_length_minutes / 7.5),
        "mga_16_1" => ctx.sun_time_at_angle(16.1),
        "mga_18" => ctx.sun_time_at_angle(18.0),
        "mga_19_8" => ctx.sun_time_at_angle(19.8),
        "mga_26" => ctx.sun_time_at_angle(26.0),
        "baal_hatanya" => ctx.sun_time_at_angle(1.583),
        "ateret_torah" => (Value::Time(times.sunrise), Value::Time(times.sunset + ChronoDuration::minutes(40))),
        other => return Err(Diagnostic::runtime(format!("unknown base '{other}'"))),
    })
}
