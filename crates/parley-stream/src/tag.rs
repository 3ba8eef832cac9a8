//! Delimiter scanning for `<tag>…</tag>` regions.
//!
//! Matching is exact, case-sensitive and non-nested: the first closing
//! delimiter after an opening one terminates the region, even when another
//! opening delimiter appears in between.

/// A literal tag pair as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub name: &'static str,
    pub open: &'static str,
    pub close: &'static str,
}

/// Reasoning region emitted by thinking models.
pub const THINK: Tag = Tag {
    name: "think",
    open: "<think>",
    close: "</think>",
};

/// Code artifact region wrapping a fenced code block.
pub const CODE_ARTIFACT: Tag = Tag {
    name: "CODE_ARTIFACT",
    open: "<CODE_ARTIFACT>",
    close: "</CODE_ARTIFACT>",
};

/// Where the next region of a tag sits inside a buffer.
///
/// Offsets are byte offsets into the scanned buffer. `open` points at the
/// `<` of the opening delimiter, `close` at the `<` of the closing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Located {
    /// No opening delimiter in the buffer.
    Absent,
    /// Opening delimiter found but nothing closes it yet. Everything from
    /// `open` onward is unclassified.
    Incomplete { open: usize },
    /// Both delimiters found, in order.
    Complete { open: usize, close: usize },
}

/// The three pieces of a buffer around a complete region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region<'a> {
    pub before: &'a str,
    pub inner: &'a str,
    pub after: &'a str,
}

impl Tag {
    /// Find the next region of this tag in `buf`.
    pub fn locate(&self, buf: &str) -> Located {
        let Some(open) = buf.find(self.open) else {
            return Located::Absent;
        };
        let body = open + self.open.len();
        match buf[body..].find(self.close) {
            Some(rel) => Located::Complete {
                open,
                close: body + rel,
            },
            None => Located::Incomplete { open },
        }
    }

    /// Offset of the first closing delimiter in `buf`, for callers that are
    /// already inside a region.
    pub fn find_close(&self, buf: &str) -> Option<usize> {
        buf.find(self.close)
    }

    /// Split `buf` around a complete region previously returned by `locate`.
    pub fn split<'a>(&self, buf: &'a str, open: usize, close: usize) -> Region<'a> {
        Region {
            before: &buf[..open],
            inner: &buf[open + self.open.len()..close],
            after: &buf[close + self.close.len()..],
        }
    }

    /// Text following the opening delimiter at `open`.
    pub fn after_open<'a>(&self, buf: &'a str, open: usize) -> &'a str {
        &buf[open + self.open.len()..]
    }

    /// Text following the closing delimiter at `close`.
    pub fn after_close<'a>(&self, buf: &'a str, close: usize) -> &'a str {
        &buf[close + self.close.len()..]
    }
}

/// Length of the longest proper suffix of `buf` that is a prefix of
/// `delimiter`.
///
/// That suffix may still grow into the delimiter once more input arrives, so
/// it must not be classified while the stream is open. Delimiters are ASCII,
/// so the returned length always lands on a char boundary.
pub fn partial_len(buf: &str, delimiter: &str) -> usize {
    let max = delimiter.len().saturating_sub(1).min(buf.len());
    (1..=max)
        .rev()
        .find(|&n| buf.ends_with(&delimiter[..n]))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_when_no_opening_delimiter() {
        assert_eq!(THINK.locate("plain text"), Located::Absent);
        assert_eq!(THINK.locate(""), Located::Absent);
        // stray closer is not an opener
        assert_eq!(THINK.locate("oops</think>"), Located::Absent);
    }

    #[test]
    fn incomplete_when_only_opened() {
        assert_eq!(
            THINK.locate("Hi <think>still going"),
            Located::Incomplete { open: 3 }
        );
    }

    #[test]
    fn complete_region_splits_into_three_pieces() {
        let buf = "a<think>b</think>c";
        let Located::Complete { open, close } = THINK.locate(buf) else {
            panic!("expected complete region");
        };
        let region = THINK.split(buf, open, close);
        assert_eq!(region.before, "a");
        assert_eq!(region.inner, "b");
        assert_eq!(region.after, "c");
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert_eq!(THINK.locate("<THINK>x</THINK>"), Located::Absent);
        assert_eq!(
            CODE_ARTIFACT.locate("<code_artifact>x</code_artifact>"),
            Located::Absent
        );
    }

    #[test]
    fn first_closer_wins_without_nesting() {
        let buf = "<think>a<think>b</think>c</think>";
        let Located::Complete { open, close } = THINK.locate(buf) else {
            panic!("expected complete region");
        };
        let region = THINK.split(buf, open, close);
        assert_eq!(region.inner, "a<think>b");
        assert_eq!(region.after, "c</think>");
    }

    #[test]
    fn closer_before_opener_is_ignored() {
        let buf = "</think>x<think>y";
        assert_eq!(THINK.locate(buf), Located::Incomplete { open: 9 });
    }

    #[test]
    fn partial_len_finds_longest_delimiter_prefix() {
        assert_eq!(partial_len("Hi <thi", "<think>"), 4);
        assert_eq!(partial_len("Hi <", "<think>"), 1);
        assert_eq!(partial_len("Hi", "<think>"), 0);
        assert_eq!(partial_len("x</thin", "</think>"), 6);
        // a full delimiter is not a partial one
        assert_eq!(partial_len("<think>", "<think>"), 0);
        assert_eq!(partial_len("", "<think>"), 0);
    }

    #[test]
    fn partial_len_is_safe_on_multibyte_text() {
        assert_eq!(partial_len("héllo wörld ✓", "<think>"), 0);
        assert_eq!(partial_len("✓<CODE_", CODE_ARTIFACT.open), 6);
    }
}
