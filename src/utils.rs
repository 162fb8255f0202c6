use std::time::Duration;

/// Milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Shorthand for configured millisecond delays
pub fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

/// Escapes a string for use as a CSS identifier (`CSS.escape` semantics)
pub fn css_escape(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    let chars: Vec<char> = ident.chars().collect();

    if chars.len() == 1 && chars[0] == '-' {
        return "\\-".to_string();
    }

    for (i, &c) in chars.iter().enumerate() {
        match c {
            '\0' => out.push('\u{FFFD}'),
            '\u{1}'..='\u{1f}' | '\u{7f}' => out.push_str(&format!("\\{:x} ", c as u32)),
            '0'..='9' if i == 0 || (i == 1 && chars[0] == '-') => {
                out.push_str(&format!("\\{:x} ", c as u32))
            }
            '-' | '_' | 'a'..='z' | 'A'..='Z' | '0'..='9' => out.push(c),
            c if (c as u32) >= 0x80 => out.push(c),
            c => {
                out.push('\\');
                out.push(c);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_escape() {
        assert_eq!(css_escape("results"), "results");
        assert_eq!(css_escape("main-list_2"), "main-list_2");
        assert_eq!(css_escape("1col"), "\\31 col");
        assert_eq!(css_escape("a:b"), "a\\:b");
        assert_eq!(css_escape("w-1/2"), "w-1\\/2");
        assert_eq!(css_escape("-"), "\\-");
    }
}
