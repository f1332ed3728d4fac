/// How a single-poll request identifies its poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollLookup<'a> {
    ByIdAndTitle { id: i64, title: &'a str },
    ById(i64),
    ByTitle(&'a str),
    Missing,
}

impl<'a> PollLookup<'a> {
    /// `id <= 0` and an empty `title` both mean "not provided".
    pub fn new(id: i64, title: &'a str) -> Self {
        match (id > 0, !title.is_empty()) {
            (true, true) => PollLookup::ByIdAndTitle { id, title },
            (true, false) => PollLookup::ById(id),
            (false, true) => PollLookup::ByTitle(title),
            (false, false) => PollLookup::Missing,
        }
    }

    pub fn from_options(id: Option<i64>, title: Option<&'a str>) -> Self {
        Self::new(id.unwrap_or(0), title.unwrap_or(""))
    }
}

/// Wraps `needle` for a `LIKE ... ESCAPE '\'` substring match.
pub(crate) fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
