//! Hashtag facets for post rich text
//!
//! Bluesky annotates spans of post text with facets addressed by UTF-8 byte
//! offsets, not character positions. A `#` followed by one or more word
//! characters (Unicode letters, digits, `_`) is a hashtag; its facet covers
//! the whole token including the `#`, and the tag value drops the `#`.

use serde::{Deserialize, Serialize};

/// A hashtag annotation over `text[byte_start..byte_end]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    pub byte_start: usize,
    pub byte_end: usize,
    pub tag: String,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Find every hashtag in `text`, left to right, without overlap
///
/// ```
/// use libskypost::facets::extract_hashtags;
///
/// let facets = extract_hashtags("Hello #BlueSky and #Python");
/// let tags: Vec<_> = facets.iter().map(|f| f.tag.as_str()).collect();
/// assert_eq!(tags, ["BlueSky", "Python"]);
/// assert_eq!((facets[0].byte_start, facets[0].byte_end), (6, 14));
/// ```
pub fn extract_hashtags(text: &str) -> Vec<Facet> {
    let mut facets = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c != '#' {
            continue;
        }

        let tag_start = start + c.len_utf8();
        let mut end = tag_start;
        while let Some(&(idx, next)) = chars.peek() {
            if !is_word_char(next) {
                break;
            }
            end = idx + next.len_utf8();
            chars.next();
        }

        // A bare '#' is not a tag; scanning resumes at the following char,
        // which may itself be a '#'.
        if end > tag_start {
            facets.push(Facet {
                byte_start: start,
                byte_end: end,
                tag: text[tag_start..end].to_string(),
            });
        }
    }

    facets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(facets: &[Facet]) -> Vec<&str> {
        facets.iter().map(|f| f.tag.as_str()).collect()
    }

    #[test]
    fn test_two_hashtags_in_order() {
        let text = "Hello #BlueSky and #Python";
        let facets = extract_hashtags(text);

        assert_eq!(tags(&facets), ["BlueSky", "Python"]);
        assert_eq!(&text[facets[0].byte_start..facets[0].byte_end], "#BlueSky");
        assert_eq!(&text[facets[1].byte_start..facets[1].byte_end], "#Python");
    }

    #[test]
    fn test_no_hashtags() {
        assert!(extract_hashtags("").is_empty());
        assert!(extract_hashtags("plain text, no tags").is_empty());
        assert!(extract_hashtags("a lonely # sign").is_empty());
    }

    #[test]
    fn test_emoji_before_tag_shifts_by_encoded_length() {
        // U+1F600 encodes to 4 bytes
        let facets = extract_hashtags("😀 #rust");
        assert_eq!(facets.len(), 1);
        assert_eq!(facets[0].byte_start, 5);
        assert_eq!(facets[0].byte_end, 10);

        let ascii = extract_hashtags("x #rust");
        assert_eq!(facets[0].byte_start - ascii[0].byte_start, 3);
    }

    #[test]
    fn test_multibyte_tag_body() {
        let text = "café #naïve";
        let facets = extract_hashtags(text);
        assert_eq!(tags(&facets), ["naïve"]);
        assert_eq!(facets[0].byte_start, 6);
        assert_eq!(facets[0].byte_end, text.len());
    }

    #[test]
    fn test_adjacent_and_doubled_hashes() {
        assert_eq!(tags(&extract_hashtags("#a#b")), ["a", "b"]);
        assert_eq!(tags(&extract_hashtags("##tag")), ["tag"]);

        let facets = extract_hashtags("##tag");
        assert_eq!((facets[0].byte_start, facets[0].byte_end), (1, 5));
    }

    #[test]
    fn test_punctuation_ends_tag() {
        let facets = extract_hashtags("Loving #rust_lang2024! #ok.");
        assert_eq!(tags(&facets), ["rust_lang2024", "ok"]);
    }

    #[test]
    fn test_spans_are_ordered_and_disjoint() {
        let samples = [
            "#one #two #three",
            "🎉🎉 #party at #home 🏠 #",
            "x#y#z ##w #_ #9",
            "日本語 #タグ と #tag",
        ];

        for text in samples {
            let facets = extract_hashtags(text);
            for pair in facets.windows(2) {
                assert!(pair[0].byte_end <= pair[1].byte_start, "overlap in {:?}", text);
            }
            for facet in &facets {
                assert!(facet.byte_start < facet.byte_end);
                assert!(text.is_char_boundary(facet.byte_start));
                assert!(text.is_char_boundary(facet.byte_end));
                let token = &text[facet.byte_start..facet.byte_end];
                assert_eq!(token.strip_prefix('#'), Some(facet.tag.as_str()));
            }
        }
    }
}
