//! Recipe tokenizer: turns recipe text into a sequence of field-tokenized
//! lines, handling backslash-space escaping, heredoc bodies, and brace
//! continuations.
//!
//! This module only tokenizes; it knows nothing about entry types or masks.
//! [`crate::builder::Recipe::add`] interprets the fields each [`RawLine`]
//! carries.

use crate::Error;
use crate::Result;

/// One recipe line, already split into whitespace-separated fields with
/// `\ ` escapes resolved, any leading `?` stripped into `failable`, and any
/// heredoc body or brace-continuation block folded into the trailing data
/// field.
#[derive(Debug, Clone)]
pub struct RawLine {
    /// 1-based source line number of the first physical line.
    pub line: usize,
    /// `true` if the line began with `?`: a failed resolution should be
    /// skipped rather than aborting the whole recipe.
    pub failable: bool,
    /// Whitespace-separated fields, in recipe column order.
    pub fields: Vec<String>,
}

/// Split `s` on runs of ASCII whitespace, honoring `\ ` as a literal space
/// within a field. Mirrors the tokenizer's escaping rule: a backslash only
/// escapes a following space, nothing else.
fn split_fields(s: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars().peekable();
    let mut in_field = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&' ') => {
                current.push(' ');
                chars.next();
                in_field = true;
            }
            c if c.is_whitespace() => {
                if in_field {
                    fields.push(std::mem::take(&mut current));
                    in_field = false;
                }
            }
            c => {
                current.push(c);
                in_field = true;
            }
        }
    }
    if in_field {
        fields.push(current);
    }
    fields
}

fn is_heredoc_tag(field: &str) -> Option<&str> {
    field.strip_prefix("<<")
}

/// Tokenize a whole recipe document into [`RawLine`]s.
///
/// Blank lines and lines whose first non-whitespace character is `#` are
/// skipped. A line whose data field opens a heredoc (`<<TAG`) consumes
/// subsequent physical lines verbatim until one equals `TAG`, folding them
/// (joined by `\n`, with a trailing `\n`) into that field. A line ending in
/// an unterminated `{` consumes subsequent lines as additional field text
/// until a line starting with `}` is seen, blank/`#`-comment lines within
/// the block being skipped.
pub fn tokenize(text: &str) -> Result<Vec<RawLine>> {
    let physical: Vec<&str> = text.lines().collect();
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < physical.len() {
        let line_no = i + 1;
        let raw = physical[i];
        let trimmed = raw.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            i += 1;
            continue;
        }

        let (failable, body) = match trimmed.strip_prefix('?') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, trimmed),
        };

        let mut fields = split_fields(body);
        i += 1;

        // The data/heredoc/continuation field is always whatever field is
        // last on the physical line, its column position varying by type
        // (the create-family's `data` column, or the trailing field of any
        // other type's brace-continuation). `<<TAG` heredocs only make
        // sense for the create-family's byte payload.
        let is_create_family = matches!(fields.first().map(String::as_str), Some("c") | Some("cl") | Some("b64"));
        if let Some(last) = fields.len().checked_sub(1) {
            if is_create_family && is_heredoc_tag(&fields[last]).is_some() {
                let tag = is_heredoc_tag(&fields[last]).unwrap().to_string();
                let mut data = String::new();
                loop {
                    if i >= physical.len() {
                        return Err(Error::invalid_line(line_no, format!("unterminated heredoc <<{tag}")));
                    }
                    if physical[i] == tag {
                        i += 1;
                        break;
                    }
                    data.push_str(physical[i]);
                    data.push('\n');
                    i += 1;
                }
                fields[last] = data;
            } else if fields[last].ends_with('{') && !fields[last].ends_with("\\{") {
                fields[last].pop();
                let mut block = String::new();
                loop {
                    if i >= physical.len() {
                        return Err(Error::invalid_line(line_no, "unterminated { continuation"));
                    }
                    let candidate = physical[i].trim_start();
                    if candidate.starts_with('}') {
                        i += 1;
                        let remainder = candidate[1..].trim_start();
                        if !remainder.is_empty() {
                            fields.extend(split_fields(remainder));
                        }
                        break;
                    }
                    if !(candidate.is_empty() || candidate.starts_with('#')) {
                        block.push_str(physical[i]);
                        block.push('\n');
                    }
                    i += 1;
                }
                fields[last].push_str(&block);
            }
        }

        out.push(RawLine {
            line: line_no,
            failable,
            fields,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_blank_and_comment_lines() {
        let lines = tokenize("\n# a comment\nd 0755 0 0 . /\n").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].line, 3);
    }

    #[test]
    fn backslash_space_escapes_within_a_field() {
        let lines = tokenize("f /bin/my\\ file /dst 0644 0 0\n").unwrap();
        assert_eq!(lines[0].fields[1], "/bin/my file");
    }

    #[test]
    fn leading_question_mark_marks_failable() {
        let lines = tokenize("?f /maybe /dst 0644 0 0\n").unwrap();
        assert!(lines[0].failable);
        assert_eq!(lines[0].fields[0], "f");
    }

    #[test]
    fn heredoc_is_captured_verbatim() {
        let text = "c /motd 0644 0 0 <<EOF\nhello\nworld\nEOF\n";
        let lines = tokenize(text).unwrap();
        let last = lines[0].fields.len() - 1;
        assert_eq!(lines[0].fields[last], "hello\nworld\n");
    }

    #[test]
    fn brace_continuation_collects_lines_until_close() {
        let text = "r . /dst {\nbin/ls\nbin/cat\n}\n";
        let lines = tokenize(text).unwrap();
        let last = lines[0].fields.len() - 1;
        assert_eq!(lines[0].fields[last], "bin/ls\nbin/cat\n");
    }
}
