//! Splitting command lines on the sequencing operators the shell owns.
//!
//! Only `;` and `&&` are interpreted here. Everything else (pipes, globs,
//! redirection, `||`) stays inside a unit and is left to the shell.

#[derive(Default)]
struct QuoteState {
    single: bool,
    double: bool,
}

impl QuoteState {
    /// Track `ch`; a quote only toggles while the other kind is closed.
    fn observe(&mut self, ch: char) {
        match ch {
            '\'' if !self.double => self.single = !self.single,
            '"' if !self.single => self.double = !self.double,
            _ => {}
        }
    }

    fn closed(&self) -> bool {
        !self.single && !self.double
    }
}

fn push_segment(units: &mut Vec<String>, segment: &str) {
    let trimmed = segment.trim();
    if !trimmed.is_empty() {
        units.push(trimmed.to_owned());
    }
}

/// Split on `;` outside quotes. A backslash and the character after it are
/// copied through untouched, so `\;` never separates.
pub fn split_on_semicolons(line: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut current = String::new();
    let mut quotes = QuoteState::default();
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            current.push(ch);
            if let Some(escaped) = chars.next() {
                current.push(escaped);
            }
            continue;
        }
        if ch == ';' && quotes.closed() {
            push_segment(&mut units, &current);
            current.clear();
            continue;
        }
        quotes.observe(ch);
        current.push(ch);
    }
    push_segment(&mut units, &current);
    units
}

/// Split on `&&` outside quotes. Backslashes get no special treatment.
pub fn split_on_double_ampersand(line: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut current = String::new();
    let mut quotes = QuoteState::default();
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '&' && quotes.closed() && chars.peek() == Some(&'&') {
            chars.next();
            push_segment(&mut units, &current);
            current.clear();
            continue;
        }
        quotes.observe(ch);
        current.push(ch);
    }
    push_segment(&mut units, &current);
    units
}

/// Join an `ssh host` line with the command on the following line, so
/// `ssh host\nls -la` becomes `ssh host "ls -la"`.
pub fn transform_multiline(text: &str) -> String {
    let mut lines: Vec<String> = text.trim().split('\n').map(str::to_owned).collect();
    if lines.len() < 2 {
        return text.to_owned();
    }

    for i in 0..lines.len() - 1 {
        let current = lines[i].trim().to_owned();
        let is_ssh = current.starts_with("ssh ")
            && !current.ends_with('"')
            && !current.ends_with('\'')
            && current.split_whitespace().count() >= 2;
        if is_ssh {
            let next = lines[i + 1].trim().to_owned();
            lines[i] = format!("{current} \"{next}\"");
            lines[i + 1].clear();
        }
    }

    lines
        .into_iter()
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
