//! RFC 5545 content lines and the component tree.
//!
//! Parsing is lossless for everything the filter does not touch: property
//! and parameter names are upper-cased, but values (including parameter
//! quoting) are kept verbatim so serialisation reproduces them.

use crate::error::CalendarError;

/// Maximum octets per physical output line, excluding the CRLF.
const FOLD_WIDTH: usize = 75;

/// A property parameter, e.g. `TZID=Europe/Oslo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    /// Raw value as written, surrounding quotes included.
    pub value: String,
}

impl Parameter {
    /// Value without surrounding double quotes.
    pub fn unquoted(&self) -> &str {
        self.value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(&self.value)
    }
}

/// A single unfolded content line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub params: Vec<Parameter>,
    pub value: String,
}

impl Property {
    /// Look up a parameter by (case-insensitive) name.
    pub fn param(&self, name: &str) -> Option<&Parameter> {
        self.params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    fn parse(line: &str, line_no: usize) -> Result<Self, CalendarError> {
        let mut segments = Vec::new();
        let mut start = 0;
        let mut in_quotes = false;
        let mut colon = None;
        for (i, c) in line.char_indices() {
            match c {
                '"' => in_quotes = !in_quotes,
                ';' if !in_quotes => {
                    segments.push(&line[start..i]);
                    start = i + 1;
                }
                ':' if !in_quotes => {
                    colon = Some(i);
                    break;
                }
                _ => {}
            }
        }
        let colon = colon.ok_or_else(|| parse_error(line_no, "missing ':' in content line"))?;
        segments.push(&line[start..colon]);

        let name = segments[0];
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(parse_error(
                line_no,
                format!("invalid property name {name:?}"),
            ));
        }

        let params = segments[1..]
            .iter()
            .map(|segment| {
                segment
                    .split_once('=')
                    .map(|(name, value)| Parameter {
                        name: name.to_ascii_uppercase(),
                        value: value.to_string(),
                    })
                    .ok_or_else(|| {
                        parse_error(line_no, format!("parameter {segment:?} has no value"))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: name.to_ascii_uppercase(),
            params,
            value: line[colon + 1..].to_string(),
        })
    }

    fn content_line(&self) -> String {
        let mut line = self.name.clone();
        for param in &self.params {
            line.push(';');
            line.push_str(&param.name);
            line.push('=');
            line.push_str(&param.value);
        }
        line.push(':');
        line.push_str(&self.value);
        line
    }
}

/// A `BEGIN:`/`END:` block with its properties and nested components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub name: String,
    pub properties: Vec<Property>,
    pub components: Vec<Component>,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            components: Vec::new(),
        }
    }

    /// First property called `name`.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Every property called `name`, in document order.
    pub fn properties_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Property> {
        self.properties.iter().filter(move |p| p.name == name)
    }

    pub(crate) fn write_to(&self, out: &mut String) {
        write_folded(out, &format!("BEGIN:{}", self.name));
        for property in &self.properties {
            write_folded(out, &property.content_line());
        }
        for component in &self.components {
            component.write_to(out);
        }
        write_folded(out, &format!("END:{}", self.name));
    }
}

/// Parse a document into its single top-level component.
pub(crate) fn parse_document(source: &str) -> Result<Component, CalendarError> {
    let mut stack: Vec<Component> = Vec::new();
    let mut root = None;
    let mut last_line = 0;

    for (line_no, line) in unfold(source) {
        last_line = line_no;
        if root.is_some() {
            return Err(parse_error(line_no, "content after the end of the calendar"));
        }

        let property = Property::parse(&line, line_no)?;
        match property.name.as_str() {
            "BEGIN" => stack.push(Component::new(property.value.trim().to_ascii_uppercase())),
            "END" => {
                let name = property.value.trim().to_ascii_uppercase();
                let component = stack
                    .pop()
                    .ok_or_else(|| parse_error(line_no, format!("END:{name} without BEGIN")))?;
                if component.name != name {
                    return Err(parse_error(
                        line_no,
                        format!("END:{name} does not close BEGIN:{}", component.name),
                    ));
                }
                match stack.last_mut() {
                    Some(parent) => parent.components.push(component),
                    None => root = Some(component),
                }
            }
            _ => match stack.last_mut() {
                Some(component) => component.properties.push(property),
                None => return Err(parse_error(line_no, "property outside of any component")),
            },
        }
    }

    if let Some(open) = stack.last() {
        return Err(parse_error(
            last_line,
            format!("BEGIN:{} is never closed", open.name),
        ));
    }
    root.ok_or(CalendarError::Empty)
}

/// Join folded lines. Yields `(first physical line number, logical line)`.
fn unfold(source: &str) -> Vec<(usize, String)> {
    let mut lines: Vec<(usize, String)> = Vec::new();
    for (idx, raw) in source.split('\n').enumerate() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(rest) = raw.strip_prefix([' ', '\t']) {
            if let Some((_, last)) = lines.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        if raw.trim().is_empty() {
            continue;
        }
        lines.push((idx + 1, raw.to_string()));
    }
    lines
}

fn write_folded(out: &mut String, line: &str) {
    let mut rest = line;
    let mut width = FOLD_WIDTH;
    while rest.len() > width {
        let mut cut = width;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        out.push_str(&rest[..cut]);
        out.push_str("\r\n ");
        rest = &rest[cut..];
        // Continuation lines spend one octet on the leading space.
        width = FOLD_WIDTH - 1;
    }
    out.push_str(rest);
    out.push_str("\r\n");
}

fn parse_error(line: usize, message: impl Into<String>) -> CalendarError {
    CalendarError::Parse {
        line,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_with_quoted_parameter() {
        let p = Property::parse(
            r#"ATTENDEE;CN="Doe, Jane";X-NUM-GUESTS=0:mailto:jane@example.com"#,
            1,
        )
        .unwrap();
        assert_eq!(p.name, "ATTENDEE");
        assert_eq!(p.params.len(), 2);
        assert_eq!(p.param("cn").unwrap().unquoted(), "Doe, Jane");
        assert_eq!(p.value, "mailto:jane@example.com");
        assert_eq!(
            p.content_line(),
            r#"ATTENDEE;CN="Doe, Jane";X-NUM-GUESTS=0:mailto:jane@example.com"#
        );
    }

    #[test]
    fn property_without_colon_is_rejected() {
        let err = Property::parse("SUMMARY Lunch", 7).unwrap_err();
        assert!(matches!(err, CalendarError::Parse { line: 7, .. }));
    }

    #[test]
    fn parameter_without_value_is_rejected() {
        assert!(Property::parse("DTSTART;TZID:20240101T100000", 1).is_err());
    }

    #[test]
    fn unfold_joins_continuation_lines() {
        let lines = unfold("DESCRIPTION:a long\r\n  description\r\nSUMMARY:x\r\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], (1, "DESCRIPTION:a long description".to_string()));
        assert_eq!(lines[1], (3, "SUMMARY:x".to_string()));
    }

    #[test]
    fn long_lines_fold_at_75_octets() {
        let mut out = String::new();
        let value = "x".repeat(200);
        write_folded(&mut out, &format!("DESCRIPTION:{value}"));

        let physical: Vec<&str> = out.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert!(physical.iter().all(|l| l.len() <= FOLD_WIDTH));
        assert!(physical[1..].iter().all(|l| l.starts_with(' ')));

        let unfolded = unfold(&out);
        assert_eq!(unfolded[0].1, format!("DESCRIPTION:{value}"));
    }

    #[test]
    fn folding_respects_char_boundaries() {
        let mut out = String::new();
        write_folded(&mut out, &format!("SUMMARY:{}", "ø".repeat(60)));
        assert_eq!(unfold(&out)[0].1, format!("SUMMARY:{}", "ø".repeat(60)));
    }

    #[test]
    fn mismatched_end_is_rejected() {
        let err = parse_document("BEGIN:VCALENDAR\nBEGIN:VEVENT\nEND:VCALENDAR\n").unwrap_err();
        assert!(matches!(err, CalendarError::Parse { line: 3, .. }));
    }

    #[test]
    fn unclosed_component_is_rejected() {
        let err = parse_document("BEGIN:VCALENDAR\nVERSION:2.0\n").unwrap_err();
        assert!(err.to_string().contains("never closed"));
    }

    #[test]
    fn blank_document_is_empty() {
        assert_eq!(parse_document("\r\n\r\n"), Err(CalendarError::Empty));
    }
}
