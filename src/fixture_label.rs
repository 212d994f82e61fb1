use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

/// Official FPL abbreviations plus the legacy spellings and feed-specific
/// variants we have seen upstream. Every value is exactly three uppercase
/// letters.
pub static TEAM_ABBREVIATIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("Arsenal", "ARS"),
        ("Aston Villa", "AVL"),
        ("Bournemouth", "BOU"),
        ("Brentford", "BRE"),
        ("Brighton", "BHA"),
        ("Brighton & Hove Albion", "BHA"),
        // Kept for legacy data consistency
        ("Burnley", "BUR"),
        ("Chelsea", "CHE"),
        ("Crystal Palace", "CRY"),
        ("Everton", "EVE"),
        ("Fulham", "FUL"),
        ("Ipswich", "IPS"),
        ("Ipswich Town", "IPS"),
        ("Leicester", "LEI"),
        ("Leicester City", "LEI"),
        ("Liverpool", "LIV"),
        ("Luton", "LUT"),
        ("Luton Town", "LUT"),
        ("Man City", "MCI"),
        ("Manchester City", "MCI"),
        ("Man Utd", "MUN"),
        ("Manchester United", "MUN"),
        ("Newcastle", "NEW"),
        ("Newcastle United", "NEW"),
        ("Nott'm Forest", "NFO"),
        ("Nottingham Forest", "NFO"),
        ("Sheffield Utd", "SHU"),
        ("Sheffield United", "SHU"),
        ("Southampton", "SOU"),
        ("Spurs", "TOT"),
        ("Tottenham", "TOT"),
        ("Tottenham Hotspur", "TOT"),
        ("West Ham", "WHU"),
        ("West Ham United", "WHU"),
        ("Wolves", "WOL"),
        ("Wolverhampton", "WOL"),
        ("Wolverhampton Wanderers", "WOL"),
        // Non-standard feed inputs
        ("AST", "AVL"),
        ("MNC", "MCI"),
        ("MNU", "MUN"),
        ("NOT", "NFO"),
        ("NFO", "NFO"),
        ("SHU", "SHU"),
        ("SOU", "SOU"),
    ])
});

static KNOWN_CODES: Lazy<HashSet<&'static str>> =
    Lazy::new(|| TEAM_ABBREVIATIONS.values().copied().collect());

/// Normalizes an upstream fixture-opponent label ("Man City (H)", "MCI",
/// "Liverpool") into the canonical `vs XXX (H/A)` display string.
///
/// Single-pass only: feed it raw upstream labels, not strings this function
/// already produced. Malformed input degrades to a best-effort label; this
/// never fails.
pub fn format_fixture(fixture: Option<&str>) -> String {
    let Some(fixture) = fixture else {
        return String::new();
    };
    let trimmed = fixture.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let (team_raw, suffix) = split_venue_suffix(trimmed);
    let code = resolve_team_code(team_raw);

    if suffix.is_empty() {
        format!("vs {code}")
    } else {
        format!("vs {code} {suffix}")
    }
}

/// Splits a trailing `(H)` / `(A)` marker (any case, optional preceding
/// whitespace) off the label. The team token must be non-empty, so a bare
/// "(H)" is treated as a team token, not a venue.
fn split_venue_suffix(input: &str) -> (&str, &'static str) {
    if input.len() >= 4 && input.is_char_boundary(input.len() - 3) {
        let (head, tail) = input.split_at(input.len() - 3);
        let suffix = match tail.to_ascii_uppercase().as_str() {
            "(H)" => Some("(H)"),
            "(A)" => Some("(A)"),
            _ => None,
        };
        if let Some(suffix) = suffix {
            let team = head.trim_end();
            if !team.is_empty() {
                return (team, suffix);
            }
        }
    }
    (input, "")
}

fn resolve_team_code(team_raw: &str) -> String {
    if let Some(code) = TEAM_ABBREVIATIONS.get(team_raw) {
        return (*code).to_string();
    }

    let upper = team_raw.to_uppercase();
    // The reference UI probed `upper in Object.values(table)` here, which
    // tests array indices and can never hit a code; since every known code is
    // exactly three letters, a real set test produces the same outputs as
    // falling through to the length heuristic. We keep the set test.
    if KNOWN_CODES.contains(upper.as_str()) {
        return upper;
    }
    if upper.chars().count() == 3 {
        return upper;
    }
    team_raw.to_string()
}

/// FPL element types: 1=GK, 2=DEF, 3=MID, 4=FWD. Anything else is blank.
pub fn position_text(element_type: u8) -> &'static str {
    match element_type {
        1 => "GK",
        2 => "DEF",
        3 => "MID",
        4 => "FWD",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_inputs_stay_empty() {
        assert_eq!(format_fixture(None), "");
        assert_eq!(format_fixture(Some("")), "");
        assert_eq!(format_fixture(Some("   ")), "");
    }

    #[test]
    fn full_name_with_venue_maps_to_code() {
        assert_eq!(format_fixture(Some("Man City (H)")), "vs MCI (H)");
        assert_eq!(format_fixture(Some("Nottingham Forest (A)")), "vs NFO (A)");
    }

    #[test]
    fn code_with_venue_passes_through() {
        assert_eq!(format_fixture(Some("MCI (A)")), "vs MCI (A)");
    }

    #[test]
    fn lowercase_venue_is_normalized() {
        assert_eq!(format_fixture(Some("Liverpool (a)")), "vs LIV (A)");
    }

    #[test]
    fn full_name_without_venue_has_no_trailing_space() {
        assert_eq!(format_fixture(Some("Brighton & Hove Albion")), "vs BHA");
    }

    // Pins the resolution-chain decision: the reference's "already an
    // abbreviation" probe never matched, and the corrected set test keeps the
    // same observable results — unknown 3-letter tokens still pass through
    // uppercased via the length heuristic.
    #[test]
    fn unmapped_three_letter_token_passes_through_uppercased() {
        assert_eq!(format_fixture(Some("XYZ")), "vs XYZ");
        assert_eq!(format_fixture(Some("xyz (h)")), "vs XYZ (H)");
    }

    #[test]
    fn lowercase_known_code_resolves() {
        assert_eq!(format_fixture(Some("mci")), "vs MCI");
    }

    #[test]
    fn legacy_feed_codes_remap() {
        assert_eq!(format_fixture(Some("AST (H)")), "vs AVL (H)");
        assert_eq!(format_fixture(Some("MNU")), "vs MUN");
    }

    #[test]
    fn unknown_long_name_is_kept_verbatim() {
        assert_eq!(
            format_fixture(Some("Sheffield Wednesday")),
            "vs Sheffield Wednesday"
        );
    }

    #[test]
    fn bare_venue_marker_is_treated_as_a_token() {
        // No team token before the marker, so "(H)" itself is the token and
        // the 3-character heuristic uppercases it.
        assert_eq!(format_fixture(Some("(H)")), "vs (H)");
    }

    #[test]
    fn abbreviation_values_are_three_uppercase_letters() {
        for code in TEAM_ABBREVIATIONS.values() {
            assert_eq!(code.len(), 3, "{code}");
            assert!(code.chars().all(|c| c.is_ascii_uppercase()), "{code}");
        }
    }

    #[test]
    fn position_text_covers_the_closed_enum() {
        assert_eq!(position_text(1), "GK");
        assert_eq!(position_text(2), "DEF");
        assert_eq!(position_text(3), "MID");
        assert_eq!(position_text(4), "FWD");
        assert_eq!(position_text(0), "");
        assert_eq!(position_text(9), "");
    }
}
