//! Label canonicalization and approximate matching.
//!
//! The similarity is the Ratcliff/Obershelp ratio `2 * M / T`, where `T` is
//! the total number of characters of both strings and `M` the number of
//! characters in the matching blocks found by repeatedly taking the longest
//! common substring and recursing on both sides of it.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lowercases, strips diacritics and collapses all whitespace runs
/// (non-breaking spaces included) to a single space.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .replace('\u{a0}', " ")
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();
    folded.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// `normalize`, followed by the removal of a trailing `es` or `s`.
/// Only meant for comparisons, never for display.
pub fn normalize_strict(text: &str) -> String {
    let t = normalize(text);
    if let Some(stem) = t.strip_suffix("es") {
        stem.to_string()
    } else if let Some(stem) = t.strip_suffix('s') {
        stem.to_string()
    } else {
        t
    }
}

/// The similarity of two strings, between 0 (nothing in common) and 1 (equal).
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

// Returns (start in a, start in b, length). Among the longest blocks, the one
// starting first in a, then first in b.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let mut best = (alo, blo, 0);
    let mut prev = vec![0usize; bhi - blo + 1];
    for i in alo..ahi {
        let mut cur = vec![0usize; bhi - blo + 1];
        for j in blo..bhi {
            if a[i] == b[j] {
                let k = prev[j - blo] + 1;
                cur[j - blo + 1] = k;
                if k > best.2 {
                    best = (i + 1 - k, j + 1 - k, k);
                }
            }
        }
        prev = cur;
    }
    best
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut total = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        total += k;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            pending.push((i + k, ahi, j + k, bhi));
        }
    }
    total
}

/// The position and score of the candidate most similar to `query`, if its
/// similarity reaches `cutoff`. Both sides are compared as given.
///
/// Ties go to the candidate that comes first.
pub fn closest<S: AsRef<str>>(query: &str, candidates: &[S], cutoff: f64) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, c) in candidates.iter().enumerate() {
        let score = ratio(query, c.as_ref());
        if score < cutoff {
            continue;
        }
        match best {
            Some((_, s)) if s >= score => {}
            _ => best = Some((idx, score)),
        }
    }
    best
}

/// The candidate whose normalized form is most similar to the normalized
/// query, if the similarity reaches `cutoff`.
pub fn best_match<'a, S: AsRef<str>>(query: &str, candidates: &'a [S], cutoff: f64) -> Option<&'a S> {
    let keys: Vec<String> = candidates.iter().map(|c| normalize(c.as_ref())).collect();
    closest(&normalize(query), &keys, cutoff).map(|(idx, _)| &candidates[idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_case_accents_and_spaces() {
        assert_eq!(normalize("  Facultad de\u{a0}Ciencias   Médicas "), "facultad de ciencias medicas");
        assert_eq!(normalize("ÁRBOL\tÑandú"), "arbol nandu");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        for s in [
            "Escuela de Matemáticas",
            " Otras  Unidades No Académicas ",
            "İstanbul",
            "Ångström\u{a0}\u{a0}x",
            "",
        ] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "{:?}", s);
        }
    }

    #[test]
    fn strict_drops_plural_suffix() {
        assert_eq!(normalize_strict("Matemáticas"), "matematica");
        assert_eq!(normalize_strict("Unidades"), "unidad");
        assert_eq!(normalize_strict("Sede"), "sede");
    }

    #[test]
    fn ratio_values() {
        assert_eq!(ratio("abcd", "bcde"), 0.75);
        assert_eq!(ratio("", ""), 1.0);
        assert_eq!(ratio("abc", ""), 0.0);
        assert_eq!(ratio("same", "same"), 1.0);
        // blocks "a" and "c" on both sides of "b"
        assert!((ratio("abxc", "ayc") - 4.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn best_match_respects_cutoff() {
        let cols = vec!["Programa de Magíster", "Sede", "Centros de Investigación"];
        assert_eq!(
            best_match("centros de investigacion", &cols, 0.6),
            Some(&"Centros de Investigación")
        );
        assert_eq!(best_match("Facultad de Derecho", &cols, 0.6), None);
        assert_eq!(best_match("anything", &Vec::<String>::new(), 0.0), None);
    }

    #[test]
    fn best_match_never_returns_below_cutoff() {
        let cols = vec!["abcdef", "uvwxyz", "abcxyz"];
        for q in ["abc", "xyz", "zzz", "abcdef", "a"] {
            if let Some(c) = best_match(q, &cols, 0.6) {
                assert!(ratio(&normalize(q), &normalize(c)) >= 0.6);
            }
            for c in cols.iter() {
                if ratio(&normalize(q), &normalize(c)) >= 0.6 {
                    assert!(best_match(q, &cols, 0.6).is_some());
                }
            }
        }
    }

    #[test]
    fn ties_go_to_first_candidate() {
        let cols = vec!["abx", "aby"];
        assert_eq!(closest("ab", &cols, 0.5), Some((0, 0.8)));
    }
}
