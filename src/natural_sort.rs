//! Natural ordering of names: embedded digit runs compare as numbers, so
//! `file2` sorts before `file10`. Temperature and angle labelled series rely
//! on this to come out in physical order.
use std::cmp::Ordering;

use itertools::Itertools;

#[derive(Debug, PartialEq, Eq)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn chunks(s: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_digits: Option<bool> = None;

    for (i, c) in s.char_indices() {
        let is_digit = c.is_ascii_digit();
        match in_digits {
            Some(prev) if prev != is_digit => {
                out.push(make_chunk(&s[start..i], prev));
                start = i;
            }
            _ => {}
        }
        in_digits = Some(is_digit);
    }
    if let Some(prev) = in_digits {
        out.push(make_chunk(&s[start..], prev));
    }
    out
}

fn make_chunk(s: &str, digits: bool) -> Chunk<'_> {
    if digits {
        Chunk::Digits(s)
    } else {
        Chunk::Text(s)
    }
}

/// Compare two digit runs by numeric value without parsing (no overflow on
/// long runs), then by length so `01` and `1` keep a stable order.
fn cmp_digits(a: &str, b: &str) -> Ordering {
    let ta = a.trim_start_matches('0');
    let tb = b.trim_start_matches('0');
    ta.len()
        .cmp(&tb.len())
        .then_with(|| ta.cmp(tb))
        .then_with(|| a.len().cmp(&b.len()))
}

/// Natural comparison of two strings.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let ca = chunks(a);
    let cb = chunks(b);

    for pair in ca.iter().zip_longest(cb.iter()) {
        let ord = match pair {
            itertools::EitherOrBoth::Both(x, y) => match (x, y) {
                (Chunk::Digits(x), Chunk::Digits(y)) => cmp_digits(x, y),
                (Chunk::Text(x), Chunk::Text(y)) => x.cmp(y),
                // digits sort before text
                (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
                (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
            },
            itertools::EitherOrBoth::Left(_) => Ordering::Greater,
            itertools::EitherOrBoth::Right(_) => Ordering::Less,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Sort in place with [`natural_cmp`].
pub fn natural_sort<S: AsRef<str>>(items: &mut [S]) {
    items.sort_by(|a, b| natural_cmp(a.as_ref(), b.as_ref()));
}

#[cfg(test)]
mod natural_sort_test {
    use super::*;

    #[test]
    fn test_numeric_runs_in_order() {
        let mut names = vec!["a2.csv", "a10.csv", "a1.csv"];
        natural_sort(&mut names);
        assert_eq!(names, vec!["a1.csv", "a2.csv", "a10.csv"]);
    }

    #[test]
    fn test_mixed_names() {
        let mut names = vec![
            "T125_sig.txt",
            "T80_ref.txt",
            "T95_sig.txt",
            "T80_sig.txt",
            "notes",
        ];
        natural_sort(&mut names);
        assert_eq!(
            names,
            vec![
                "T80_ref.txt",
                "T80_sig.txt",
                "T95_sig.txt",
                "T125_sig.txt",
                "notes"
            ]
        );
    }

    #[test]
    fn test_leading_zeros_and_prefixes() {
        assert_eq!(natural_cmp("file007", "file7"), Ordering::Greater);
        assert_eq!(natural_cmp("file7", "file08"), Ordering::Less);
        assert_eq!(natural_cmp("abc", "abc1"), Ordering::Less);
        assert_eq!(natural_cmp("", ""), Ordering::Equal);
        assert_eq!(
            natural_cmp("x99999999999999999999999", "x100000000000000000000000"),
            Ordering::Less
        );
    }
}
