//! Closed identifier sets from the external interface: which bare words
//! classify as primitives, functions, directions, bases or condition
//! variables. Mirrors the teacher's closed `TokenType::WH_WORDS`/`MODALS`
//! const-slice convention, scaled to this domain's vocabulary.

pub const PRIMITIVES: &[&str] = &[
    "visible_sunrise",
    "visible_sunset",
    "sunrise",
    "sunset",
    "geometric_sunrise",
    "geometric_sunset",
    "solar_noon",
    "solar_midnight",
    "civil_dawn",
    "civil_dusk",
    "nautical_dawn",
    "nautical_dusk",
    "astronomical_dawn",
    "astronomical_dusk",
];

pub const FUNCTIONS: &[&str] = &[
    "solar",
    "seasonal_solar",
    "proportional_hours",
    "proportional_minutes",
    "midpoint",
    "first_valid",
    "earlier_of",
    "later_of",
];

pub const DIRECTIONS: &[&str] = &[
    "before_visible_sunrise",
    "after_visible_sunrise",
    "before_visible_sunset",
    "after_visible_sunset",
    "before_geometric_sunrise",
    "after_geometric_sunrise",
    "before_geometric_sunset",
    "after_geometric_sunset",
    "before_noon",
    "after_noon",
    "before_sunrise",
    "after_sunrise",
    "after_sunset",
];

/// Directions accepted by `seasonal_solar` and `proportional_minutes`: the
/// visible/geometric sunrise/sunset subset, excluding the noon directions.
pub const SUN_EVENT_DIRECTIONS: &[&str] = &[
    "before_visible_sunrise",
    "after_visible_sunset",
    "before_geometric_sunrise",
    "after_geometric_sunset",
];

pub const BASES: &[&str] = &[
    "gra",
    "mga",
    "mga_72",
    "mga_60",
    "mga_90",
    "mga_96",
    "mga_120",
    "mga_72_zmanis",
    "mga_90_zmanis",
    "mga_96_zmanis",
    "mga_16_1",
    "mga_18",
    "mga_19_8",
    "mga_26",
    "baal_hatanya",
    "ateret_torah",
    "custom",
];

pub const CONDITION_VARS: &[&str] = &[
    "latitude",
    "longitude",
    "day_length",
    "month",
    "day",
    "day_of_year",
    "date",
    "season",
];

pub const KEYWORDS: &[&str] = &["if", "else"];

pub fn is_primitive(name: &str) -> bool {
    PRIMITIVES.contains(&name)
}

pub fn is_function(name: &str) -> bool {
    FUNCTIONS.contains(&name)
}

pub fn is_direction(name: &str) -> bool {
    DIRECTIONS.contains(&name)
}

pub fn is_base(name: &str) -> bool {
    BASES.contains(&name)
}

pub fn is_condition_var(name: &str) -> bool {
    CONDITION_VARS.contains(&name)
}

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// All identifier-like words known to the language, used to seed
/// typo-suggestion candidates for an unrecognised identifier.
pub fn all_known_words() -> Vec<&'static str> {
    let mut words = Vec::new();
    words.extend_from_slice(PRIMITIVES);
    words.extend_from_slice(FUNCTIONS);
    words.extend_from_slice(DIRECTIONS);
    words.extend_from_slice(BASES);
    words.extend_from_slice(CONDITION_VARS);
    words.extend_from_slice(KEYWORDS);
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_contain_core_events() {
        assert!(is_primitive("visible_sunrise"));
        assert!(is_primitive("solar_midnight"));
        assert!(!is_primitive("solar"));
    }

    #[test]
    fn functions_are_disjoint_from_primitives() {
        for f in FUNCTIONS {
            assert!(!is_primitive(f));
        }
    }

    #[test]
    fn sun_event_directions_is_subset_of_directions() {
        for d in SUN_EVENT_DIRECTIONS {
            assert!(is_direction(d));
        }
    }

    #[test]
    fn custom_is_a_base() {
        assert!(is_base("custom"));
    }

    #[test]
    fn day_of_year_and_date_are_condition_vars() {
        assert!(is_condition_var("day_of_year"));
        assert!(is_condition_var("date"));
    }

    #[test]
    fn all_known_words_is_nonempty_and_deduplicatable() {
        let words = all_known_words();
        assert!(words.len() > 20);
    }
}
