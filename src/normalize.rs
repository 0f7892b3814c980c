//! Deterministic text cleanup for catalog descriptions.
//!
//! Catalog exports arrive with recurring punctuation and spacing defects:
//! bare phone numbers, stray spaces before periods, sentences concatenated
//! with no separator. [`normalize`] applies an ordered pipeline of rewrites:
//!
//! 1. Reformat bare `nnn-nnn-nnnn` phone numbers as `(nnn) nnn-nnnn`
//! 2. Remove whitespace before sentence/list punctuation
//! 3. Insert a space after a sentence terminator glued to an uppercase letter
//! 4. Insert a space after a closing parenthesis glued to a letter or digit
//! 5. Collapse runs of two or more spaces
//!
//! Step 2 must run before step 3, and step 5 must run last to absorb any
//! incidental whitespace the earlier rewrites introduce.

/// Normalize description text. Total: never fails, empty in gives empty out.
pub fn normalize(text: &str) -> String {
    let text = rewrite_phone_numbers(text);
    let text = trim_space_before_punctuation(&text);
    let text = separate_run_on_sentences(&text);
    let text = space_after_closing_paren(&text);
    collapse_spaces(&text)
}

/// Rewrite bare 3-3-4 phone numbers into parenthesized-area-code form.
fn rewrite_phone_numbers(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len() + 8);
    let mut i = 0;
    while i < bytes.len() {
        if phone_starts_at(bytes, i) {
            out.push('(');
            out.push_str(&text[i..i + 3]);
            out.push_str(") ");
            out.push_str(&text[i + 4..i + 12]);
            i += 12;
            continue;
        }
        match text[i..].chars().next() {
            Some(ch) => {
                out.push(ch);
                i += ch.len_utf8();
            }
            None => break,
        }
    }
    out
}

/// True when `bytes[i..]` begins a standalone `ddd-ddd-dddd` group.
/// Adjacent digits or hyphens disqualify the match, so longer digit runs
/// and already-formatted numbers are left alone.
fn phone_starts_at(bytes: &[u8], i: usize) -> bool {
    if i + 12 > bytes.len() {
        return false;
    }
    let all_digits = |lo: usize, hi: usize| bytes[lo..hi].iter().all(u8::is_ascii_digit);
    if !(all_digits(i, i + 3)
        && bytes[i + 3] == b'-'
        && all_digits(i + 4, i + 7)
        && bytes[i + 7] == b'-'
        && all_digits(i + 8, i + 12))
    {
        return false;
    }
    if i > 0 && (bytes[i - 1].is_ascii_digit() || bytes[i - 1] == b'-') {
        return false;
    }
    if i + 12 < bytes.len() && (bytes[i + 12].is_ascii_digit() || bytes[i + 12] == b'-') {
        return false;
    }
    true
}

/// Drop spaces and tabs immediately preceding `. , ! ? ; :`.
fn trim_space_before_punctuation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '.' | ',' | '!' | '?' | ';' | ':') {
            while out.ends_with(' ') || out.ends_with('\t') {
                out.pop();
            }
        }
        out.push(ch);
    }
    out
}

/// Insert a space after `. ! ?` when an uppercase letter follows directly.
fn separate_run_on_sentences(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        out.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            if let Some(next) = chars.peek() {
                if next.is_ascii_uppercase() {
                    out.push(' ');
                }
            }
        }
    }
    out
}

/// Insert a space after `)` when a letter or digit follows directly.
fn space_after_closing_paren(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        out.push(ch);
        if ch == ')' {
            if let Some(next) = chars.peek() {
                if next.is_ascii_alphanumeric() {
                    out.push(' ');
                }
            }
        }
    }
    out
}

/// Collapse any run of two or more spaces into a single space.
fn collapse_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_space = false;
    for ch in text.chars() {
        if ch == ' ' {
            if !prev_space {
                out.push(ch);
            }
            prev_space = true;
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out
}
