//! Feature location text and gb-io locations, reduced to a single 1-based span.

use crate::feature::{Feature, Strand};
use gb_io::seq::Location;
use itertools::Itertools;

/// A 1-based inclusive span. `start > end` marks a span across the origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub strand: Strand,
}

impl Span {
    fn flipped(self) -> Self {
        Self {
            strand: self.strand.flipped(),
            ..self
        }
    }
}

fn strip_call<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    text.strip_prefix(name)?
        .strip_prefix('(')?
        .strip_suffix(')')
}

fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = vec![];
    let mut depth = 0usize;
    let mut from = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&text[from..i]);
                from = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[from..]);
    parts
}

fn parse_position(text: &str) -> Option<usize> {
    let pos = text.trim_matches(|c| c == '<' || c == '>').parse::<usize>().ok()?;
    (pos > 0).then_some(pos)
}

/// Collapses ordered parts into one span. Parts that restart below the
/// previous end on a circular parent run across the origin.
fn merge_parts(mut parts: Vec<Span>, circular: bool) -> Option<Span> {
    let strand = parts.first()?.strand;
    if parts.iter().all(|p| p.strand == Strand::Reverse) {
        // complement parts are listed 3' to 5'
        parts.reverse();
    }
    let first = parts.first()?;
    let last = parts.last()?;
    let wraps = circular
        && parts
            .iter()
            .tuple_windows()
            .any(|(a, b)| b.start < a.end || a.start > a.end);
    if wraps {
        return Some(Span {
            start: first.start,
            end: last.end,
            strand,
        });
    }
    let start = parts.iter().map(|p| p.start.min(p.end)).min()?;
    let end = parts.iter().map(|p| p.start.max(p.end)).max()?;
    Some(Span { start, end, strand })
}

/// Parses flat-file location text. Zero-length sites (`a^b`), remote
/// references and anything unreadable yield `None`.
pub fn parse_location(text: &str, circular: bool) -> Option<Span> {
    let text: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let text = text.as_str();

    if let Some(inner) = strip_call(text, "complement") {
        return parse_location(inner, circular).map(Span::flipped);
    }
    if let Some(inner) = strip_call(text, "join").or_else(|| strip_call(text, "order")) {
        let parts = split_top_level(inner)
            .into_iter()
            .map(|part| parse_location(part, circular))
            .collect::<Option<Vec<_>>>()?;
        return merge_parts(parts, circular);
    }
    if text.contains('^') || text.contains(':') {
        return None;
    }

    let (start, end) = match text.split_once("..") {
        Some((from, to)) => (parse_position(from)?, parse_position(to)?),
        None => {
            let pos = parse_position(text)?;
            (pos, pos)
        }
    };
    let (start, end) = if start > end && !circular {
        (end, start)
    } else {
        (start, end)
    };
    Some(Span {
        start,
        end,
        strand: Strand::Forward,
    })
}

/// Location text for a feature; spans across the origin become a two-part join.
pub fn format_location(feature: &Feature, parent_len: usize) -> String {
    let range = |from: usize, to: usize| {
        if from == to {
            from.to_string()
        } else {
            format!("{from}..{to}")
        }
    };
    let inner = if feature.wraps_origin() {
        format!(
            "join({},{})",
            range(feature.start, parent_len),
            range(1, feature.end)
        )
    } else {
        range(feature.start, feature.end)
    };
    match feature.strand {
        Strand::Forward => inner,
        Strand::Reverse => format!("complement({inner})"),
    }
}

pub fn to_gb_location(feature: &Feature, parent_len: usize) -> Location {
    let start = feature.start as i64 - 1;
    let location = if feature.wraps_origin() {
        Location::Join(vec![
            Location::simple_range(start, parent_len as i64),
            Location::simple_range(0, feature.end as i64),
        ])
    } else {
        Location::simple_range(start, feature.end as i64)
    };
    match feature.strand {
        Strand::Forward => location,
        Strand::Reverse => Location::Complement(Box::new(location)),
    }
}

fn collect_location_spans(location: &Location, reverse: bool, spans: &mut Vec<Span>) {
    let strand = if reverse {
        Strand::Reverse
    } else {
        Strand::Forward
    };
    match location {
        Location::Range((from, _), (to, _)) => {
            // gb-io ranges are 0-based and end-exclusive
            if *from >= 0 && *to > 0 {
                spans.push(Span {
                    start: *from as usize + 1,
                    end: *to as usize,
                    strand,
                });
            }
        }
        Location::Complement(inner) => {
            let mut inner_spans = vec![];
            collect_location_spans(inner, !reverse, &mut inner_spans);
            spans.extend(inner_spans.into_iter().rev());
        }
        Location::Join(parts)
        | Location::Order(parts)
        | Location::Bond(parts)
        | Location::OneOf(parts) => {
            for part in parts {
                collect_location_spans(part, reverse, spans);
            }
        }
        Location::External(_, _) | Location::Between(_, _) | Location::Gap(_) => {}
    }
}

/// Reduces a gb-io location to a span. The strand is the majority strand
/// of the parts.
pub fn from_gb_location(location: &Location, circular: bool) -> Option<Span> {
    let mut spans = vec![];
    collect_location_spans(location, false, &mut spans);
    if spans.is_empty() {
        return None;
    }
    let reverse = spans.iter().filter(|s| s.strand == Strand::Reverse).count();
    let strand = if reverse > spans.len() / 2 {
        Strand::Reverse
    } else {
        Strand::Forward
    };
    let span = merge_parts(spans, circular)?;
    Some(Span { strand, ..span })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize, strand: Strand) -> Span {
        Span { start, end, strand }
    }

    #[test]
    fn test_parse_simple_locations() {
        assert_eq!(parse_location("10..200", false), Some(span(10, 200, Strand::Forward)));
        assert_eq!(parse_location("<1..>50", false), Some(span(1, 50, Strand::Forward)));
        assert_eq!(parse_location("42", false), Some(span(42, 42, Strand::Forward)));
        assert_eq!(
            parse_location("complement(300..400)", false),
            Some(span(300, 400, Strand::Reverse))
        );
        assert_eq!(parse_location("0..10", false), None);
        assert_eq!(parse_location("10^11", false), None);
        assert_eq!(parse_location("J00194.1:100..202", false), None);
    }

    #[test]
    fn test_parse_origin_spanning_locations() {
        assert_eq!(parse_location("2600..20", true), Some(span(2600, 20, Strand::Forward)));
        assert_eq!(parse_location("2600..20", false), Some(span(20, 2600, Strand::Forward)));
        assert_eq!(
            parse_location("join(2600..2686,1..20)", true),
            Some(span(2600, 20, Strand::Forward))
        );
        assert_eq!(
            parse_location("complement(join(2600..2686,1..20))", true),
            Some(span(2600, 20, Strand::Reverse))
        );
        assert_eq!(
            parse_location("join(complement(1..20),complement(2600..2686))", true),
            Some(span(2600, 20, Strand::Reverse))
        );
        // exon-style joins keep the outer bounds
        assert_eq!(
            parse_location("join(10..20,\n 40..50)", true),
            Some(span(10, 50, Strand::Forward))
        );
    }

    #[test]
    fn test_format_location() {
        let f = Feature::new("CDS", "x", 10, 20, Strand::Forward);
        assert_eq!(format_location(&f, 100), "10..20");
        let f = Feature::new("CDS", "x", 90, 5, Strand::Reverse);
        assert_eq!(format_location(&f, 100), "complement(join(90..100,1..5))");
        let f = Feature::new("misc_feature", "x", 7, 7, Strand::Forward);
        assert_eq!(format_location(&f, 100), "7");
        let f = Feature::new("misc_feature", "x", 100, 1, Strand::Forward);
        assert_eq!(format_location(&f, 100), "join(100,1)");
    }

    #[test]
    fn test_gb_location_roundtrip() {
        for (start, end, strand) in [(10, 20, Strand::Forward), (90, 5, Strand::Reverse)] {
            let f = Feature::new("CDS", "x", start, end, strand);
            let location = to_gb_location(&f, 100);
            assert_eq!(from_gb_location(&location, true), Some(span(start, end, strand)));
        }
        assert_eq!(
            from_gb_location(&Location::Between(4, 5), false),
            None
        );
    }
}
