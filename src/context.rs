//! The evaluation context: inputs (date, location, elevation, timezone),
//! lazily-computed sun positions, and the mutable named-formula cache.
//! Owned by exactly one evaluation run (§5).

use std::collections::HashMap;

use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::astro::{SunCalculator, SunTimes};
use crate::intern::Symbol;
use crate::value::Value;

pub struct EvaluationContext<'c> {
    pub date: NaiveDate,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: f64,
    pub tz: Tz,

    calculator: &'c dyn SunCalculator,
    sun_times: Option<SunTimes>,

    /// Only `Time`-typed entries are ever stored here (§3 invariant);
    /// non-time results are never cross-referenced, so there is nothing to
    /// cache for them.
    cache: HashMap<String, Value>,
}

impl<'c> EvaluationContext<'c> {
    pub fn new(
        date: NaiveDate,
        latitude: f64,
        longitude: f64,
        elevation_m: f64,
        tz: Tz,
        calculator: &'c dyn SunCalculator,
    ) -> Self {
        EvaluationContext {
            date,
            latitude,
            longitude,
            elevation_m,
            tz,
            calculator,
            sun_times: None,
            cache: HashMap::new(),
        }
    }

    pub fn sun_times(&mut self) -> SunTimes {
        if let Some(times) = self.sun_times {
            return times;
        }
        let times = self.calculator.sun_times(self.date, self.latitude, self.longitude, self.elevation_m, self.tz);
        self.sun_times = Some(times);
        times
    }

    pub fn sun_time_at_angle(&self, degrees: f64) -> (Value, Value) {
        let (dawn, dusk) =
            self.calculator.sun_time_at_angle(self.date, self.latitude, self.longitude, self.tz, degrees);
        (Value::Time(dawn), Value::Time(dusk))
    }

    pub fn sun_time_at_angle_with_elevation(&self, degrees: f64) -> (Value, Value) {
        let (dawn, dusk) = self.calculator.sun_time_at_angle_with_elevation(
            self.date,
            self.latitude,
            self.longitude,
            self.elevation_m,
            self.tz,
            degrees,
        );
        (Value::Time(dawn), Value::Time(dusk))
    }

    pub fn seasonal_sun_time_at_angle(&self, degrees: f64) -> (Value, Value) {
        let (dawn, dusk) =
            self.calculator.seasonal_sun_time_at_angle(self.date, self.latitude, self.longitude, self.tz, degrees);
        (Value::Time(dawn), Value::Time(dusk))
    }

    pub fn cache_get(&self, key: &str) -> Option<&Value> {
        self.cache.get(key)
    }

    /// Panics are never raised here: callers only ever insert `Value::Time`
    /// per the named-formula cache invariant (§3).
    pub fn cache_insert(&mut self, key: String, value: Value) {
        debug_assert!(matches!(value, Value::Time(_)));
        self.cache.insert(key, value);
    }

    pub fn month(&self) -> u32 {
        use chrono::Datelike;
        self.date.month()
    }

    pub fn day(&self) -> u32 {
        use chrono::Datelike;
        self.date.day()
    }

    pub fn day_of_year(&self) -> u32 {
        use chrono::Datelike;
        self.date.ordinal()
    }

    /// Season derived from month and hemisphere sign of latitude (§6.3).
    pub fn season(&self) -> &'static str {
        let northern = self.latitude >= 0.0;
        let month = self.month();
        let base = match month {
            12 | 1 | 2 => "winter",
            3..=5 => "spring",
            6..=8 => "summer",
            9..=11 => "autumn",
            _ => unreachable!(),
        };
        if northern {
            base
        } else {
            match base {
                "winter" => "summer",
                "summer" => "winter",
                "spring" => "autumn",
                "autumn" => "spring",
                _ => unreachable!(),
            }
        }
    }
}

/// Resolves an interned symbol purely for readable cache keys and error
/// messages without threading the interner through every call site.
pub fn resolve(interner: &crate::intern::Interner, sym: Symbol) -> String {
    interner.resolve(sym).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::NoaaSunCalculator;

    fn ctx(calc: &dyn SunCalculator) -> EvaluationContext<'_> {
        EvaluationContext::new(
            NaiveDate::from_ymd_opt(2024, 3, 21).unwrap(),
            31.7683,
            35.2137,
            800.0,
            chrono_tz::Asia::Jerusalem,
            calc,
        )
    }

    #[test]
    fn sun_times_is_computed_lazily_and_cached() {
        let calc = NoaaSunCalculator;
        let mut c = ctx(&calc);
        assert!(c.sun_times.is_none());
        let first = c.sun_times();
        assert!(c.sun_times.is_some());
        let second = c.sun_times();
        assert_eq!(first.sunrise, second.sunrise);
    }

    #[test]
    fn season_northern_hemisphere_spring_equinox() {
        let calc = NoaaSunCalculator;
        let c = ctx(&calc);
        assert_eq!(c.season(), "spring");
    }

    #[test]
    fn season_flips_in_southern_hemisphere() {
        let calc = NoaaSunCalculator;
        let mut c = ctx(&calc);
        c.latitude = -31.9505; // Perth
        assert_eq!(c.season(), "autumn");
    }

    #[test]
    fn cache_insert_and_get_round_trips() {
        let calc = NoaaSunCalculator;
        let mut c = ctx(&calc);
        let v = c.sun_times();
        c.cache_insert("visible_sunrise".to_string(), Value::Time(v.sunrise));
        assert_eq!(c.cache_get("visible_sunrise"), Some(&Value::Time(v.sunrise)));
        assert_eq!(c.cache_get("missing"), None);
    }

    #[test]
    fn day_of_year_matches_date() {
        let calc = NoaaSunCalculator;
        let c = ctx(&calc);
        assert_eq!(c.day_of_year(), 81); // 2024 is a leap year; Mar 21 is day 81
    }
}
