use log;
use std::path::Path;

/// Comment delimiters for a language, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentStyle {
    pub line: Option<&'static str>,
    pub block: Option<(&'static str, &'static str)>,
}

const C_STYLE: CommentStyle = CommentStyle {
    line: Some("//"),
    block: Some(("/*", "*/")),
};

/// Static extension -> delimiter mapping. Unknown extensions fall back to
/// C-style.
pub fn comment_style_for(extension: &str) -> CommentStyle {
    match extension {
        "rs" | "c" | "h" | "cpp" | "hpp" | "cc" | "go" | "java" | "js" | "cjs" | "mjs" | "jsx"
        | "ts" | "tsx" | "cs" | "swift" | "kt" | "scala" | "dart" | "php" => C_STYLE,
        "py" | "rb" | "sh" | "bash" | "zsh" | "fish" | "pl" | "pm" | "r" | "yml" | "yaml"
        | "toml" | "ini" | "cfg" | "conf" | "mk" | "dockerfile" | "ex" | "exs" => CommentStyle {
            line: Some("#"),
            block: None,
        },
        "lua" => CommentStyle {
            line: Some("--"),
            block: Some(("--[[", "]]")),
        },
        "sql" | "hs" | "elm" => CommentStyle {
            line: Some("--"),
            block: None,
        },
        "html" | "htm" | "xml" | "svg" | "md" | "markdown" => CommentStyle {
            line: None,
            block: Some(("<!--", "-->")),
        },
        "css" | "scss" | "less" => CommentStyle {
            line: None,
            block: Some(("/*", "*/")),
        },
        "lisp" | "el" | "clj" | "cljs" | "scm" => CommentStyle {
            line: Some(";;"),
            block: None,
        },
        "ps1" => CommentStyle {
            line: Some("#"),
            block: Some(("<#", "#>")),
        },
        "bat" | "cmd" => CommentStyle {
            line: Some("REM"),
            block: None,
        },
        "vim" => CommentStyle {
            line: Some("\""),
            block: None,
        },
        "tex" => CommentStyle {
            line: Some("%"),
            block: None,
        },
        _ => C_STYLE,
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssembleOptions {
    pub strip_comments: bool,
    pub aggressive_whitespace: bool,
}

/// Builds the assembled content block for one accepted file: header line
/// identifying the relative path, then normalized content. Returns None when
/// the file is binary, not valid UTF-8, or blank after normalization.
pub fn assemble(rel_path: &str, bytes: &[u8], options: &AssembleOptions) -> Option<String> {
    if is_binary(bytes) {
        log::debug!("Skipping binary file: {}", rel_path);
        return None;
    }
    let text = match std::str::from_utf8(bytes) {
        Ok(t) => t,
        Err(e) => {
            log::debug!("Skipping non-UTF-8 file: {} ({})", rel_path, e);
            return None;
        }
    };

    let style = comment_style_for(&extension_of(rel_path));
    let stripped = if options.strip_comments {
        strip_comments(text, style)
    } else {
        text.to_string()
    };

    let normalized = if options.aggressive_whitespace {
        compress_whitespace(&stripped)
    } else {
        normalize_whitespace(&stripped)
    };

    if normalized.trim().is_empty() {
        log::trace!("Skipping empty file: {}", rel_path);
        return None;
    }

    let mut block = header_line(rel_path, style);
    block.push('\n');
    block.push_str(&normalized);
    if !block.ends_with('\n') {
        block.push('\n');
    }
    Some(block)
}

pub fn header_line(rel_path: &str, style: CommentStyle) -> String {
    match (style.line, style.block) {
        (Some(delim), _) => format!("{} File: {}", delim, rel_path),
        (None, Some((open, close))) => format!("{} File: {} {}", open, rel_path, close),
        (None, None) => format!("// File: {}", rel_path),
    }
}

fn extension_of(rel_path: &str) -> String {
    Path::new(rel_path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Heuristic binary check: a NUL byte in the first 8 KiB.
pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(8192).any(|&b| b == 0)
}

/// Removes line and block comments for the given style. String literals
/// (single and double quoted) are honored so delimiters inside them survive.
pub fn strip_comments(text: &str, style: CommentStyle) -> String {
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    let mut string_delim: Option<char> = None;

    while i < text.len() {
        let c = match text[i..].chars().next() {
            Some(c) => c,
            None => break,
        };

        if let Some(delim) = string_delim {
            out.push(c);
            i += c.len_utf8();
            if c == '\\' {
                if let Some(escaped) = text[i..].chars().next() {
                    out.push(escaped);
                    i += escaped.len_utf8();
                }
                continue;
            }
            if c == delim {
                string_delim = None;
            }
            continue;
        }

        if let Some((open, close)) = style.block {
            if text[i..].starts_with(open) {
                match text[i + open.len()..].find(close) {
                    Some(end) => {
                        i += open.len() + end + close.len();
                        continue;
                    }
                    None => break, // unterminated block comment swallows the rest
                }
            }
        }
        if let Some(line) = style.line {
            if text[i..].starts_with(line) {
                match text[i..].find('\n') {
                    Some(end) => {
                        i += end; // keep the newline itself
                        continue;
                    }
                    None => break,
                }
            }
        }

        if c == '"' || c == '\'' {
            string_delim = Some(c);
        }
        out.push(c);
        i += c.len_utf8();
    }
    out
}

/// Collapses runs of horizontal whitespace to one space and 2+ consecutive
/// blank lines to exactly one.
pub fn normalize_whitespace(text: &str) -> String {
    let mut lines = Vec::<String>::new();
    let mut blank_run = 0usize;
    for line in text.lines() {
        let collapsed = collapse_horizontal(line);
        if collapsed.is_empty() {
            blank_run += 1;
            if blank_run <= 1 {
                lines.push(String::new());
            }
        } else {
            blank_run = 0;
            lines.push(collapsed);
        }
    }
    lines.join("\n")
}

/// Aggressive mode: every whitespace run (newlines included) becomes one
/// space; a newline is reinserted after sentence-ending punctuation to keep
/// coarse structure.
pub fn compress_whitespace(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = String::with_capacity(flat.len());
    let mut chars = flat.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek() == Some(&' ') {
            chars.next();
            out.push('\n');
        }
    }
    out
}

fn collapse_horizontal(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_run = false;
    for c in line.chars() {
        if c == ' ' || c == '\t' {
            if !in_run && !out.is_empty() {
                out.push(' ');
            }
            in_run = true;
        } else {
            in_run = false;
            out.push(c);
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}
