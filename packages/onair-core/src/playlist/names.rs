//! Artist name normalisation helpers.

use std::sync::OnceLock;

use regex::Regex;

use super::Spin;

/// Generational suffixes that stay at the end of a swapped name.
const NAME_SUFFIXES: [&str; 7] = ["Jr", "Jr.", "Sr", "Sr.", "II", "III", "IV"];

/// Swaps a catalog-style "Last, First" name into display order.
///
/// Only names with exactly one `", "` separator and two non-empty halves are
/// swapped; anything else is returned unchanged. A trailing generational
/// suffix on the first-name half is kept at the end:
/// `"Smith, John Jr."` becomes `"John Smith Jr."`.
#[must_use]
pub fn swap_names(full_name: &str) -> String {
    let mut parts = full_name.split(", ");
    let (Some(last), Some(first), None) = (parts.next(), parts.next(), parts.next()) else {
        return full_name.to_string();
    };

    let (last, first) = (last.trim(), first.trim());
    if last.is_empty() || first.is_empty() {
        return full_name.to_string();
    }

    match first.rsplit_once(' ') {
        Some((given, suffix)) if NAME_SUFFIXES.contains(&suffix) => {
            format!("{} {} {}", given, last, suffix)
        }
        _ => format!("{} {}", first, last),
    }
}

/// Returns the artist as it should be displayed for a spin.
///
/// Library-tagged spins carry catalog-order names, so those are swapped.
#[must_use]
pub fn display_artist(spin: &Spin) -> String {
    if spin.tag.is_some() {
        swap_names(&spin.artist)
    } else {
        spin.artist.clone()
    }
}

/// Builds the cache key used for artist artwork.
#[must_use]
pub fn artist_key(display_name: &str) -> String {
    display_name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn psa_regex() -> &'static Regex {
    static PSA: OnceLock<Regex> = OnceLock::new();
    PSA.get_or_init(|| {
        Regex::new(r"(?i)\b(psa|public service|promo|station id|underwrit\w*|announcement)\b")
            .expect("PSA pattern is valid")
    })
}

/// Heuristically detects public-service announcements entered as spins.
#[must_use]
pub fn is_psa(spin: &Spin) -> bool {
    let re = psa_regex();
    [&spin.artist, &spin.album, &spin.track]
        .iter()
        .any(|field| re.is_match(field))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spin(artist: &str, album: &str, track: &str) -> Spin {
        Spin {
            artist: artist.into(),
            album: album.into(),
            label: String::new(),
            track: track.into(),
            tag: None,
        }
    }

    #[test]
    fn swaps_last_first() {
        assert_eq!(swap_names("Smith, John"), "John Smith");
    }

    #[test]
    fn keeps_suffix_at_end() {
        assert_eq!(swap_names("Smith, John Jr."), "John Smith Jr.");
        assert_eq!(swap_names("Jones, Quincy III"), "Quincy Jones III");
    }

    #[test]
    fn leaves_band_names_alone() {
        assert_eq!(swap_names("Earth, Wind & Fire, The"), "Earth, Wind & Fire, The");
        assert_eq!(swap_names("Wire"), "Wire");
        assert_eq!(swap_names("Smith,John"), "Smith,John");
        assert_eq!(swap_names(", John"), ", John");
    }

    #[test]
    fn display_artist_swaps_only_tagged_spins() {
        let mut s = spin("Smith, John", "Album", "Track");
        assert_eq!(display_artist(&s), "Smith, John");
        s.tag = Some(12);
        assert_eq!(display_artist(&s), "John Smith");
    }

    #[test]
    fn artist_key_collapses_case_and_whitespace() {
        assert_eq!(artist_key("  John   Smith "), "john smith");
    }

    #[test]
    fn detects_psa_entries() {
        assert!(is_psa(&spin("KZSU", "", "PSA: food drive")));
        assert!(is_psa(&spin("Station ID", "", "")));
        assert!(is_psa(&spin("Local Theatre", "Underwriting", "")));
        assert!(!is_psa(&spin("Promoe", "Kombinera", "Songs")));
        assert!(!is_psa(&spin("Stereolab", "Dots and Loops", "Brakhage")));
    }
}
