//! Airport and city lookups for the South African routes the planner covers
//!
//! The catalog is keyed by city name, while flights are keyed by IATA
//! airport code. This module bridges the two with a static table, and
//! resolves free-text city input to the closest supported city by edit
//! distance.

/// Airports offered in the flight search form, as (label, code)
pub const AIRPORT_OPTIONS: &[(&str, &str)] = &[
    ("Durban (DUR)", "DUR"),
    ("Cape Town (CPT)", "CPT"),
    ("Johannesburg (JNB)", "JNB"),
    ("Port Elizabeth (PLZ)", "PLZ"),
    ("East London (ELS)", "ELS"),
    ("Lanseria (HLA)", "HLA"),
];

/// Cities the catalog carries lodging and activities for
pub const ALLOWED_CITIES: &[&str] = &["Pretoria", "Johannesburg", "Cape Town", "Durban", "Gqeberha"];

pub const AIRPORT_NOT_FOUND: &str = "Airport not found";

/// City name used for catalog lookups of an arrival airport.
///
/// Lanseria serves Pretoria and East London falls back to Durban, since the
/// catalog has no entries of its own for either.
pub fn airport_city(code: &str) -> &'static str {
    match code {
        "HLA" => "Pretoria",
        "DUR" => "Durban",
        "CPT" => "Capetown",
        "PLZ" => "Gqeberha",
        "JNB" => "Johannesburg",
        "ELS" => "Durban",
        other => airport_label(other).unwrap_or(AIRPORT_NOT_FOUND),
    }
}

/// Display label for an airport code, e.g. `"Durban (DUR)"`
pub fn airport_label(code: &str) -> Option<&'static str> {
    AIRPORT_OPTIONS
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(label, _)| *label)
}

/// Catalog key form of a city name: lower-cased with all whitespace removed
pub fn normalize_city(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Catalog key for the city an airport serves
pub fn catalog_key_for_airport(code: &str) -> String {
    normalize_city(airport_city(code))
}

/// Edit distance with unit cost for insertion, deletion and substitution.
///
/// Works on `char`s rather than bytes so multi-byte input is measured the
/// way a user would count it.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let a_len = a.len();
    let b_len = b.len();
    let mut dp = vec![vec![0; b_len + 1]; a_len + 1];

    for (i, row) in dp.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, val) in dp[0].iter_mut().enumerate() {
        *val = j;
    }

    for (i, a_char) in a.iter().enumerate() {
        for (j, b_char) in b.iter().enumerate() {
            let cost = if a_char == b_char { 0 } else { 1 };
            dp[i + 1][j + 1] = (dp[i][j + 1] + 1)
                .min(dp[i + 1][j] + 1)
                .min(dp[i][j] + cost);
        }
    }
    dp[a_len][b_len]
}

/// Closest allowed city to free-text input, compared case-insensitively.
///
/// Ties go to the city listed first in [`ALLOWED_CITIES`].
pub fn closest_city(input: &str) -> &'static str {
    closest_match(input, ALLOWED_CITIES).unwrap_or(ALLOWED_CITIES[0])
}

/// Closest candidate to `input`; `None` only for an empty candidate list
pub fn closest_match<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    let input = input.to_lowercase();
    let mut best: Option<(&'a str, usize)> = None;

    for candidate in candidates {
        let distance = levenshtein(&input, &candidate.to_lowercase());
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((*candidate, distance)),
        }
    }

    best.map(|(city, _)| city)
}

/// Carrier name for display; unknown codes are shown as-is
pub fn airline_name(carrier_code: &str) -> &str {
    match carrier_code {
        "SA" => "South African Airways",
        "MN" => "Kulula.com",
        "4Z" => "Airlink",
        "FA" => "FlySafair",
        "BA" => "British Airways (operated by Comair)",
        other => other,
    }
}
