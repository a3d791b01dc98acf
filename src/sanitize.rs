//! Cleanup of formatting noise that generative transcription engines wrap around WebVTT.

const VTT_FENCE_OPENER: &str = "```vtt";
const BARE_FENCE_OPENER: &str = "```";
const FENCE_CLOSER: &str = "```";
const HEADER: &str = "WEBVTT";

/// Strip fenced code-block markers from the edges of a generated document and trim it.
///
/// In order we remove a leading "```vtt" opener line, a leading bare "```" opener line, and
/// a trailing "```" closer line, then trim surrounding whitespace. Interior fences are left
/// untouched. Applying `clean` to its own output is a no-op.
pub fn clean(raw: &str) -> String {
    // A single pass can expose another fence (nested fences, or whitespace before the
    // opener), so repeat until nothing changes. Each pass only shrinks the slice.
    let mut text = raw;
    loop {
        let next = clean_once(text);
        if next.len() == text.len() {
            return next.to_owned();
        }
        text = next;
    }
}

fn clean_once(text: &str) -> &str {
    let text = strip_opener(text, VTT_FENCE_OPENER);
    let text = strip_opener(text, BARE_FENCE_OPENER);
    strip_closer(text).trim()
}

/// Drop any chatter that precedes the `WEBVTT` header.
///
/// Unlike [`clean`] this is lossy, so it is opt-in. Documents without a header are returned
/// unchanged.
pub fn strip_preamble(document: &str) -> &str {
    match document.find(HEADER) {
        Some(idx) => &document[idx..],
        None => document,
    }
}

fn strip_opener<'a>(text: &'a str, opener: &str) -> &'a str {
    let Some(rest) = text.strip_prefix(opener) else {
        return text;
    };
    rest.strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(text)
}

fn strip_closer(text: &str) -> &str {
    let Some(rest) = text.strip_suffix(FENCE_CLOSER) else {
        return text;
    };
    rest.strip_suffix("\r\n")
        .or_else(|| rest.strip_suffix('\n'))
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_vtt_fence() {
        let raw = "```vtt\nWEBVTT\n\n00:00:01.000 --> 00:00:02.000\nhi\n```";
        assert_eq!(clean(raw), "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nhi");
    }

    #[test]
    fn strips_bare_fence_and_crlf() {
        let raw = "```\r\nWEBVTT\r\n```";
        assert_eq!(clean(raw), "WEBVTT");
    }

    #[test]
    fn leaves_interior_fences_alone() {
        let raw = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\n```\ncode\n```\n\nend";
        assert_eq!(clean(raw), raw);
    }

    #[test]
    fn plain_text_is_only_trimmed() {
        assert_eq!(clean("  WEBVTT \n\n"), "WEBVTT");
        assert_eq!(clean(""), "");
    }

    #[test]
    fn clean_is_idempotent() {
        let inputs = [
            "```vtt\nWEBVTT\n```",
            "```vtt\n```vtt\nWEBVTT\n```\n```",
            "  ```\nWEBVTT\n```  ",
            "\n```vtt\nWEBVTT",
            "```",
            "```\n```",
            "```vtt",
            "WEBVTT\n\nhello",
            "   ",
        ];
        for raw in inputs {
            let once = clean(raw);
            assert_eq!(clean(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn strip_preamble_cuts_leading_chatter() {
        assert_eq!(strip_preamble("Sure! Here you go:\nWEBVTT\n"), "WEBVTT\n");
        assert_eq!(strip_preamble("no header"), "no header");
    }
}
