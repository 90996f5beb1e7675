//! Разбор клавиатуры шаблона из пользовательского ввода.
//!
//! Two explicit phases instead of ad hoc JSON repair:
//!
//! 1. pre-normalization: trim, smart/curly quotes to straight quotes,
//!    bracket-balance check (reported as its own error BEFORE any
//!    structural parsing is attempted);
//! 2. structural parse: serde_json into `Vec<Vec<String>>`, then
//!    shape checks (non-empty keyboard, non-empty rows, labels non-empty
//!    after trimming).
//!
//! Each failure mode maps to exactly one error kind so the conversation
//! layer can re-prompt with targeted guidance.

use thiserror::Error;

/// Ошибки разбора клавиатуры. Тексты показываются пользователю как есть.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyboardError {
    /// `[` and `]` counts differ; reported before JSON parsing
    #[error("несбалансированные скобки")]
    UnbalancedBrackets,

    /// JSON syntax error with a locatable offset into the normalized input
    #[error("ошибка в позиции ~{offset}: ...{excerpt}...")]
    Syntax { offset: usize, excerpt: String },

    /// JSON syntax error without a usable position
    #[error("неверный формат JSON")]
    Malformed,

    #[error("клавиатура не может быть пустой")]
    Empty,

    #[error("строка {row} клавиатуры не может быть пустой")]
    EmptyRow { row: usize },

    #[error("текст кнопки не может быть пустым (строка {row})")]
    EmptyLabel { row: usize },
}

/// Пример корректного формата, прикладывается к каждому сообщению об ошибке
pub const FORMAT_EXAMPLE: &str = "Пример правильного формата клавиатуры:\n\n\
[\n    [\"Да\", \"Нет\"],\n    [\"Может быть\"]\n]\n\n\
Или для одной кнопки в строке:\n\n\
[\n    [\"Да\"],\n    [\"Нет\"]\n]";

/// Phase 1: trim and replace typographic quotes that Telegram clients love
/// to substitute. Only double-quote variants map to `"`.
pub fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{00AB}' | '\u{00BB}' => '"',
            other => other,
        })
        .collect()
}

/// Разбирает ввод владельца в строки кнопок.
///
/// Returns trimmed labels; every failure leaves the caller free to
/// re-prompt the same step with [`FORMAT_EXAMPLE`].
pub fn parse(raw: &str) -> Result<Vec<Vec<String>>, KeyboardError> {
    let input = normalize(raw);

    let opens = input.chars().filter(|&c| c == '[').count();
    let closes = input.chars().filter(|&c| c == ']').count();
    if opens != closes {
        return Err(KeyboardError::UnbalancedBrackets);
    }

    let rows: Vec<Vec<String>> = serde_json::from_str(&input).map_err(|e| {
        // serde_json reports 1-based line/column; zeroes mean "no position"
        if e.line() == 0 {
            return KeyboardError::Malformed;
        }
        let offset = byte_offset(&input, e.line(), e.column());
        KeyboardError::Syntax {
            offset,
            excerpt: excerpt_around(&input, offset),
        }
    })?;

    if rows.is_empty() {
        return Err(KeyboardError::Empty);
    }

    let mut out = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        if row.is_empty() {
            return Err(KeyboardError::EmptyRow { row: i + 1 });
        }
        let mut labels = Vec::with_capacity(row.len());
        for label in row {
            let trimmed = label.trim();
            if trimmed.is_empty() {
                return Err(KeyboardError::EmptyLabel { row: i + 1 });
            }
            labels.push(trimmed.to_string());
        }
        out.push(labels);
    }

    Ok(out)
}

/// Byte offset of a 1-based (line, column) position in `input`
fn byte_offset(input: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    for (i, l) in input.split_inclusive('\n').enumerate() {
        if i + 1 == line {
            break;
        }
        offset += l.len();
    }
    (offset + column.saturating_sub(1)).min(input.len())
}

/// ±10 characters around `offset`, clamped to char boundaries
fn excerpt_around(input: &str, offset: usize) -> String {
    let positions: Vec<usize> = input.char_indices().map(|(i, _)| i).collect();
    let pos = positions.partition_point(|&i| i < offset);
    let start = pos.saturating_sub(10);
    let end = (pos + 10).min(positions.len());
    input
        .chars()
        .skip(start)
        .take(end - start)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_accepts_two_rows_of_two_and_one() {
        let rows = parse(r#"[["Да","Нет"],["Может быть"]]"#).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["Да", "Нет"]);
        assert_eq!(rows[1], vec!["Может быть"]);
    }

    #[test]
    fn test_accepts_multiline_input_with_padding() {
        let input = "  [\n    [\"Да\"],\n    [\"Нет\"]\n]  ";
        let rows = parse(input).unwrap();
        assert_eq!(rows, vec![vec!["Да".to_string()], vec!["Нет".to_string()]]);
    }

    #[test]
    fn test_normalizes_smart_quotes() {
        let rows = parse("[[«Да», “Нет”]]").unwrap();
        assert_eq!(rows, vec![vec!["Да".to_string(), "Нет".to_string()]]);
    }

    #[test]
    fn test_labels_are_trimmed() {
        let rows = parse(r#"[["  Да  ", "Нет "]]"#).unwrap();
        assert_eq!(rows[0], vec!["Да", "Нет"]);
    }

    #[test]
    fn test_empty_row_rejected() {
        assert_eq!(parse(r#"[["Да"],[]]"#), Err(KeyboardError::EmptyRow { row: 2 }));
    }

    #[test]
    fn test_empty_keyboard_rejected() {
        assert_eq!(parse("[]"), Err(KeyboardError::Empty));
    }

    #[test]
    fn test_blank_label_rejected() {
        assert_eq!(
            parse(r#"[["Да"],["   "]]"#),
            Err(KeyboardError::EmptyLabel { row: 2 })
        );
    }

    #[test]
    fn test_unbalanced_brackets_reported_before_json_parse() {
        // This input is also invalid JSON; the bracket check must win.
        assert_eq!(parse(r#"[["Да"],["Нет"]"#), Err(KeyboardError::UnbalancedBrackets));
        assert_eq!(parse(r#"["Да"]]"#), Err(KeyboardError::UnbalancedBrackets));
    }

    #[test]
    fn test_syntax_error_carries_excerpt_of_offending_region() {
        // Balanced brackets, broken JSON: missing comma between rows.
        let err = parse(r#"[["Да"] ["Нет"]]"#).unwrap_err();
        match err {
            KeyboardError::Syntax { offset, excerpt } => {
                assert!(offset > 0);
                assert!(excerpt.contains('['), "excerpt should show the region: {excerpt}");
                assert!(excerpt.chars().count() <= 20);
            }
            other => panic!("expected Syntax error, got: {other:?}"),
        }
    }

    #[test]
    fn test_wrong_shape_is_a_syntax_class_error() {
        // Flat list instead of rows: serde_json type error, still a
        // located error pointing into the input.
        let err = parse(r#"["Да","Нет"]"#).unwrap_err();
        assert!(matches!(err, KeyboardError::Syntax { .. } | KeyboardError::Malformed));
    }

    #[test]
    fn test_error_messages_are_user_ready() {
        assert_eq!(
            KeyboardError::UnbalancedBrackets.to_string(),
            "несбалансированные скобки"
        );
        assert_eq!(
            KeyboardError::EmptyRow { row: 2 }.to_string(),
            "строка 2 клавиатуры не может быть пустой"
        );
    }
}
