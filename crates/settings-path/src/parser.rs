//! Path text parser
//!
//! Single left-to-right pass over the text. Offsets in errors are byte
//! offsets into the input.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::{PathAddress, PathError, Step};

/// Parse path text into a [`PathAddress`].
///
/// Index text must be plain decimal digits without leading zeros, so that
/// formatting a parsed path gives back the exact input.
pub fn parse_path(text: &str) -> Result<PathAddress, PathError> {
    if text.is_empty() {
        return Err(PathError::Empty);
    }

    let mut steps = Vec::new();
    let mut chars = text.char_indices().peekable();
    let mut segment_start = 0;

    loop {
        let name = read_name(text, &mut chars, segment_start)?;
        steps.push(Step::Field(name));

        // Zero or more index suffixes
        while let Some(&(offset, '[')) = chars.peek() {
            chars.next();
            steps.push(Step::Index(read_index(text, &mut chars, offset)?));
        }

        match chars.next() {
            None => break,
            Some((offset, '.')) => segment_start = offset + 1,
            Some((offset, ch)) => return Err(PathError::UnexpectedChar { offset, ch }),
        }
    }

    Ok(PathAddress { steps })
}

fn read_name(
    text: &str,
    chars: &mut Peekable<CharIndices<'_>>,
    start: usize,
) -> Result<String, PathError> {
    let mut end = start;
    while let Some(&(offset, ch)) = chars.peek() {
        match ch {
            '.' | '[' => break,
            ']' => return Err(PathError::UnexpectedChar { offset, ch }),
            _ => {
                chars.next();
                end = offset + ch.len_utf8();
            }
        }
    }

    if end == start {
        return Err(PathError::EmptySegment { offset: start });
    }
    Ok(text[start..end].to_string())
}

fn read_index(
    text: &str,
    chars: &mut Peekable<CharIndices<'_>>,
    open: usize,
) -> Result<usize, PathError> {
    let start = open + 1;
    for (offset, ch) in chars.by_ref() {
        if ch != ']' {
            continue;
        }

        let digits = &text[start..offset];
        let invalid = || PathError::InvalidIndex {
            offset: start,
            text: digits.to_string(),
        };

        if digits.is_empty()
            || !digits.bytes().all(|b| b.is_ascii_digit())
            || (digits.len() > 1 && digits.starts_with('0'))
        {
            return Err(invalid());
        }
        return digits.parse::<usize>().map_err(|_| invalid());
    }

    Err(PathError::UnterminatedIndex { offset: open })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(text: &str) -> Vec<Step> {
        parse_path(text).unwrap().steps().to_vec()
    }

    #[test]
    fn test_parse_fields() {
        assert_eq!(
            steps("system.runtime.apiPort"),
            vec![
                Step::Field("system".into()),
                Step::Field("runtime".into()),
                Step::Field("apiPort".into()),
            ]
        );
    }

    #[test]
    fn test_parse_indices() {
        assert_eq!(
            steps("email.accounts[0].imapHost"),
            vec![
                Step::Field("email".into()),
                Step::Field("accounts".into()),
                Step::Index(0),
                Step::Field("imapHost".into()),
            ]
        );
        assert_eq!(
            steps("grid[1][20]"),
            vec![Step::Field("grid".into()), Step::Index(1), Step::Index(20)]
        );
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(parse_path(""), Err(PathError::Empty));
    }

    #[test]
    fn test_empty_segments() {
        assert_eq!(parse_path("a..b"), Err(PathError::EmptySegment { offset: 2 }));
        assert_eq!(parse_path(".a"), Err(PathError::EmptySegment { offset: 0 }));
        assert_eq!(parse_path("a."), Err(PathError::EmptySegment { offset: 2 }));
        assert_eq!(parse_path("[0]"), Err(PathError::EmptySegment { offset: 0 }));
    }

    #[test]
    fn test_unterminated_index() {
        assert_eq!(
            parse_path("accounts[0"),
            Err(PathError::UnterminatedIndex { offset: 8 })
        );
    }

    #[test]
    fn test_non_numeric_index() {
        assert!(matches!(
            parse_path("accounts[x]"),
            Err(PathError::InvalidIndex { .. })
        ));
        assert!(matches!(
            parse_path("accounts[]"),
            Err(PathError::InvalidIndex { .. })
        ));
        assert!(matches!(
            parse_path("accounts[-1]"),
            Err(PathError::InvalidIndex { .. })
        ));
    }

    #[test]
    fn test_leading_zero_rejected() {
        assert!(matches!(
            parse_path("accounts[01]"),
            Err(PathError::InvalidIndex { .. })
        ));
        assert!(parse_path("accounts[0]").is_ok());
    }

    #[test]
    fn test_index_overflow() {
        assert!(matches!(
            parse_path("a[99999999999999999999999999]"),
            Err(PathError::InvalidIndex { .. })
        ));
    }

    #[test]
    fn test_garbage_after_index() {
        assert_eq!(
            parse_path("a[0]b"),
            Err(PathError::UnexpectedChar { offset: 4, ch: 'b' })
        );
        assert_eq!(
            parse_path("a]b"),
            Err(PathError::UnexpectedChar { offset: 1, ch: ']' })
        );
    }

    #[test]
    fn test_non_ascii_names() {
        let path = parse_path("ui.größe").unwrap();
        assert_eq!(path.to_string(), "ui.größe");
    }
}
