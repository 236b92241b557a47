//! Mapping of the two embedded review shapes onto [`ReviewRecord`].

use std::borrow::Cow;

use rvh_core::ReviewRecord;
use serde::Deserialize;
use serde_json::Number;
use thiserror::Error;

/// Literal leftovers that survive percent and entity decoding, applied in order.
const REPLACEMENTS: [(&str, &str); 4] = [
    ("\n", " "),
    ("<br>", " "),
    ("&#39;", "'"),
    ("\u{a0}", " "),
];

/// Named entities HTML still honours without a trailing `;`.
const LEGACY_ENTITIES: [&str; 106] = [
    "AElig", "AMP", "Aacute", "Acirc", "Agrave", "Aring", "Atilde", "Auml", "COPY", "Ccedil",
    "ETH", "Eacute", "Ecirc", "Egrave", "Euml", "GT", "Iacute", "Icirc", "Igrave", "Iuml", "LT",
    "Ntilde", "Oacute", "Ocirc", "Ograve", "Oslash", "Otilde", "Ouml", "QUOT", "REG", "THORN",
    "Uacute", "Ucirc", "Ugrave", "Uuml", "Yacute", "aacute", "acirc", "acute", "aelig", "agrave",
    "amp", "aring", "atilde", "auml", "brvbar", "ccedil", "cedil", "cent", "copy", "curren",
    "deg", "divide", "eacute", "ecirc", "egrave", "eth", "euml", "frac12", "frac14", "frac34",
    "gt", "iacute", "icirc", "iexcl", "igrave", "iquest", "iuml", "laquo", "lt", "macr", "micro",
    "middot", "nbsp", "not", "ntilde", "oacute", "ocirc", "ograve", "ordf", "ordm", "oslash",
    "otilde", "ouml", "para", "plusmn", "pound", "quot", "raquo", "reg", "sect", "shy", "sup1",
    "sup2", "sup3", "szlig", "thorn", "times", "uacute", "ucirc", "ugrave", "uml", "uuml",
    "yacute", "yen", "yuml",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("review has an empty author")]
    EmptyAuthor,
}

/// Shape A: schema.org `LocalBusiness.review[]` entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalBusinessReview {
    pub author: String,
    pub review_rating: ReviewRating,
    pub description: String,
    pub date_published: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRating {
    pub rating_value: Number,
}

/// Shape B: `bizDetailsPageProps.reviewFeedQueryProps.reviews[]` entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedReview {
    pub user: FeedUser,
    pub rating: Number,
    pub comment: FeedComment,
    pub localized_date: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedUser {
    pub markup_display_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedComment {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawReview {
    LocalBusiness(LocalBusinessReview),
    Feed(FeedReview),
}

pub fn normalize(raw: RawReview) -> Result<ReviewRecord, NormalizeError> {
    let record = match raw {
        RawReview::LocalBusiness(review) => ReviewRecord {
            author: review.author,
            rating: review.review_rating.rating_value,
            text: clean_text(&review.description),
            date: review.date_published,
        },
        RawReview::Feed(review) => ReviewRecord {
            author: review.user.markup_display_name,
            rating: review.rating,
            text: clean_text(&review.comment.text),
            date: flip_local_date(&review.localized_date),
        },
    };

    if record.author.trim().is_empty() {
        return Err(NormalizeError::EmptyAuthor);
    }
    Ok(record)
}

/// Percent-decode, entity-decode, flatten line breaks and collapse whitespace.
pub fn clean_text(text: &str) -> String {
    let percent_decoded = urlencoding::decode_binary(text.as_bytes());
    let percent_decoded = String::from_utf8_lossy(&percent_decoded);
    let terminated = terminate_legacy_entities(&percent_decoded);
    let entity_decoded = html_escape::decode_html_entities(&terminated);

    let replaced = REPLACEMENTS
        .iter()
        .fold(entity_decoded.into_owned(), |acc, (from, to)| acc.replace(from, to));

    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Add the missing `;` to legacy named entities (`&amp`, `&copy 2020`) and numeric
/// references (`&#39s`) so the entity decoder picks them up. The longest legacy
/// name that prefixes the run wins, so `&notit` becomes `&not;it`.
fn terminate_legacy_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 8);
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..=pos]);
        rest = &rest[pos + 1..];

        if let Some(numeric) = rest.strip_prefix('#') {
            let (radix, digits_from) = match numeric.chars().next() {
                Some('x' | 'X') => (16, 2),
                _ => (10, 1),
            };
            let digits = rest[digits_from.min(rest.len())..]
                .chars()
                .take_while(|c| c.is_digit(radix))
                .count();
            let end = digits_from + digits;
            if digits > 0 && !rest[end..].starts_with(';') {
                out.push_str(&rest[..end]);
                out.push(';');
                rest = &rest[end..];
            }
            continue;
        }

        let run = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        if rest[run..].starts_with(';') {
            continue;
        }
        let legacy = LEGACY_ENTITIES
            .iter()
            .filter(|name| rest[..run].starts_with(*name))
            .max_by_key(|name| name.len());
        if let Some(name) = legacy {
            out.push_str(name);
            out.push(';');
            rest = &rest[name.len()..];
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// `M/D/YYYY` -> `YYYY-MM-DD`. Anything without three `/` parts comes back as-is.
pub fn flip_local_date(text: &str) -> String {
    let parts = text.split('/').collect::<Vec<_>>();
    if parts.len() < 3 {
        return text.to_string();
    }
    format!("{}-{}-{}", parts[2], last_two(parts[0]), last_two(parts[1]))
}

fn last_two(part: &str) -> String {
    let padded = format!("0{part}").chars().collect::<Vec<_>>();
    padded[padded.len().saturating_sub(2)..].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flips_month_day_year() {
        assert_eq!(flip_local_date("3/5/2021"), "2021-03-05");
        assert_eq!(flip_local_date("12/31/1999"), "1999-12-31");
        assert_eq!(flip_local_date("07/4/2020"), "2020-07-04");
    }

    #[test]
    fn malformed_dates_pass_through_without_failing() {
        assert_eq!(flip_local_date("2021-03-05"), "2021-03-05");
        assert_eq!(flip_local_date(""), "");
        assert_eq!(flip_local_date("a/b/c"), "c-0a-0b");
        assert_eq!(flip_local_date("//2020"), "2020-0-0");
    }

    #[test]
    fn cleaning_decodes_and_collapses() {
        assert_eq!(
            clean_text("  Best&nbsp;lesson%20ever!<br>Would   come\nback &amp; again "),
            "Best lesson ever! Would come back & again"
        );
        assert_eq!(clean_text("It&amp;#39;s great"), "It's great");
        assert_eq!(clean_text("Don&#39;t miss it"), "Don't miss it");
        assert_eq!(clean_text("caf%C3%A9\u{a0}time"), "café time");
    }

    #[test]
    fn percent_decoding_runs_before_entity_decoding() {
        assert_eq!(clean_text("%26amp;"), "&");
        assert_eq!(clean_text("Fish %26amp; chips"), "Fish & chips");
        assert_eq!(clean_text("%26#39;"), "'");
    }

    #[test]
    fn legacy_entities_without_semicolon_are_decoded() {
        assert_eq!(clean_text("Tom &amp Jerry"), "Tom & Jerry");
        assert_eq!(clean_text("&copy 2020"), "© 2020");
        assert_eq!(clean_text("&notit"), "¬it");
        assert_eq!(clean_text("Kid&#39s first wave"), "Kid's first wave");
        assert_eq!(clean_text("&#x41BC"), "\u{41bc}");
    }

    #[test]
    fn unknown_or_terminated_entities_are_left_alone() {
        assert_eq!(clean_text("a & b"), "a & b");
        assert_eq!(clean_text("&bogus x"), "&bogus x");
        assert_eq!(clean_text("rock &amp; roll"), "rock & roll");
        assert_eq!(clean_text("&amp;amp"), "&amp");
        assert_eq!(clean_text("trailing &"), "trailing &");
        assert_eq!(clean_text("&#"), "&#");
    }

    #[test]
    fn cleaning_is_idempotent_on_clean_text() {
        let samples = [
            "Great instructors and a fun morning.",
            "Kids loved it - 10/10 would surf again",
            "",
        ];
        for sample in samples {
            let once = clean_text(sample);
            assert_eq!(once, sample);
            assert_eq!(clean_text(&once), once);
        }
    }

    #[test]
    fn normalizes_local_business_review() {
        let raw: LocalBusinessReview = serde_json::from_value(serde_json::json!({
            "author": "Jess M.",
            "reviewRating": { "ratingValue": 5 },
            "description": "Amazing&#39;s the word.\nTotally worth it",
            "datePublished": "2021-07-14"
        }))
        .unwrap();

        let record = normalize(RawReview::LocalBusiness(raw)).unwrap();
        assert_eq!(record.author, "Jess M.");
        assert_eq!(record.rating_text(), "5");
        assert_eq!(record.text, "Amazing's the word. Totally worth it");
        assert_eq!(record.date, "2021-07-14");
    }

    #[test]
    fn normalizes_feed_review() {
        let raw: FeedReview = serde_json::from_value(serde_json::json!({
            "user": { "markupDisplayName": "Sam R." },
            "rating": 4,
            "comment": { "text": "Solid&nbsp;board rental<br>friendly staff" },
            "localizedDate": "3/5/2021"
        }))
        .unwrap();

        let record = normalize(RawReview::Feed(raw)).unwrap();
        assert_eq!(record.author, "Sam R.");
        assert_eq!(record.rating_text(), "4");
        assert_eq!(record.text, "Solid board rental friendly staff");
        assert_eq!(record.date, "2021-03-05");
    }

    #[test]
    fn empty_author_is_rejected() {
        let raw = FeedReview {
            user: FeedUser {
                markup_display_name: "  ".to_string(),
            },
            rating: Number::from(3),
            comment: FeedComment {
                text: "ok".to_string(),
            },
            localized_date: "1/1/2020".to_string(),
        };
        assert_eq!(normalize(RawReview::Feed(raw)), Err(NormalizeError::EmptyAuthor));
    }
}
