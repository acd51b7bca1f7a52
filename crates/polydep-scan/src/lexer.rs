//! Splits source text into per-line code and comment parts.
//!
//! Just enough lexing to tell live code from commented-out code: string
//! literals are skipped so `"http://"` is not a comment, and block comments
//! carry across lines.

use polydep_core::project::Language;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineParts {
    /// 1-based line number.
    pub number: usize,
    /// Live code with comments removed.
    pub code: String,
    /// Text of every comment on the line, space-joined.
    pub comment: String,
}

pub fn split_lines(text: &str, language: Language) -> Vec<LineParts> {
    let mut in_block = false;
    text.lines()
        .enumerate()
        .map(|(idx, line)| {
            let mut parts = LineParts {
                number: idx + 1,
                ..Default::default()
            };
            match language {
                Language::CSharp => split_c_like(line, &mut parts, &mut in_block, "/*", "*/", true),
                Language::FSharp => split_c_like(line, &mut parts, &mut in_block, "(*", "*)", false),
                Language::VisualBasic => split_basic(line, &mut parts),
            }
            parts
        })
        .collect()
}

fn starts_at(chars: &[char], i: usize, pat: &str) -> bool {
    let mut j = i;
    for p in pat.chars() {
        if chars.get(j) != Some(&p) {
            return false;
        }
        j += 1;
    }
    true
}

fn split_c_like(
    line: &str,
    parts: &mut LineParts,
    in_block: &mut bool,
    block_open: &str,
    block_close: &str,
    char_literals: bool,
) {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    let mut in_str = false;
    let mut verbatim = false;

    while i < chars.len() {
        let c = chars[i];
        if *in_block {
            if starts_at(&chars, i, block_close) {
                *in_block = false;
                parts.comment.push(' ');
                i += block_close.len();
            } else {
                parts.comment.push(c);
                i += 1;
            }
            continue;
        }
        if in_str {
            parts.code.push(c);
            if c == '\\' && !verbatim {
                if let Some(&next) = chars.get(i + 1) {
                    parts.code.push(next);
                }
                i += 2;
                continue;
            }
            if c == '"' {
                in_str = false;
            }
            i += 1;
            continue;
        }
        if starts_at(&chars, i, "//") {
            if !parts.comment.is_empty() {
                parts.comment.push(' ');
            }
            parts.comment.extend(&chars[i + 2..]);
            break;
        }
        if starts_at(&chars, i, block_open) {
            *in_block = true;
            i += block_open.len();
            continue;
        }
        match c {
            '"' => {
                in_str = true;
                verbatim = i > 0 && chars[i - 1] == '@';
                parts.code.push(c);
                i += 1;
            }
            '\'' if char_literals => {
                // 'x' or '\''
                let end = if chars.get(i + 1) == Some(&'\\') { i + 3 } else { i + 2 };
                if chars.get(end) == Some(&'\'') {
                    parts.code.extend(&chars[i..=end]);
                    i = end + 1;
                } else {
                    parts.code.push(c);
                    i += 1;
                }
            }
            _ => {
                parts.code.push(c);
                i += 1;
            }
        }
    }
}

fn split_basic(line: &str, parts: &mut LineParts) {
    let trimmed = line.trim_start();
    if trimmed.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("rem ")) {
        parts.comment.push_str(&trimmed[4..]);
        return;
    }
    let mut in_str = false;
    for (i, c) in line.char_indices() {
        if in_str {
            parts.code.push(c);
            if c == '"' {
                in_str = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_str = true;
                parts.code.push(c);
            }
            '\'' => {
                parts.comment.push_str(&line[i + 1..]);
                return;
            }
            _ => parts.code.push(c),
        }
    }
}
