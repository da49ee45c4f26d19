use std::borrow::Cow;

/// Removes C0 control characters (except tab/newline/CR), DEL and ANSI
/// escape sequences from untrusted feed text.
///
/// Returns `Cow::Borrowed` when nothing needs stripping.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    fn is_stripped(c: char) -> bool {
        c == '\x7f' || (c < '\x20' && !matches!(c, '\t' | '\n' | '\r'))
    }

    if !s.chars().any(is_stripped) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            match chars.peek() {
                // CSI: parameters until a final byte in @..~
                Some('[') => {
                    chars.next();
                    for c in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&c) {
                            break;
                        }
                    }
                }
                // OSC: until BEL or ST
                Some(']') => {
                    chars.next();
                    while let Some(c) = chars.next() {
                        if c == '\x07' {
                            break;
                        }
                        if c == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            }
        } else if !is_stripped(c) {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Render width handed to html2text; wide enough that titles never wrap
const RENDER_WIDTH: usize = 4096;

/// Render an HTML fragment to plain text: tags dropped, entities decoded,
/// no link or emphasis markers.
///
/// Line breaks from block elements survive; pass the result through
/// [`collapse_whitespace`] for single-line fields. Input html2text cannot
/// render is returned unchanged.
pub fn strip_html(s: &str) -> String {
    let lines = match html2text::config::rich().lines_from_read(s.as_bytes(), RENDER_WIDTH) {
        Ok(lines) => lines,
        Err(e) => {
            tracing::debug!(error = %e, "HTML rendering failed, keeping raw text");
            return s.to_string();
        }
    };

    lines
        .iter()
        .map(|line| {
            line.tagged_strings()
                .map(|ts| ts.s.as_str())
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse runs of whitespace to single spaces and trim the ends
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a fetched title or summary for storage
pub fn clean_text(s: &str) -> String {
    collapse_whitespace(&strip_html(&strip_control_chars(s)))
}
