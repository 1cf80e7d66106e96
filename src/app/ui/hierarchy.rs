use super::selector::{Pick, Selector};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Parses the uiautomator form `[left,top][right,bottom]`.
    pub fn parse(raw: &str) -> Option<Self> {
        let numbers = raw
            .split(|ch: char| ch == '[' || ch == ']' || ch == ',')
            .filter(|part| !part.trim().is_empty())
            .map(|part| part.trim().parse::<i32>())
            .collect::<Result<Vec<_>, _>>()
            .ok()?;
        match numbers.as_slice() {
            [left, top, right, bottom] => Some(Self::new(*left, *top, *right, *bottom)),
            _ => None,
        }
    }

    pub fn center(&self) -> (i32, i32) {
        ((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    fn overlaps_vertically(&self, other: &Bounds) -> bool {
        self.top < other.bottom && other.top < self.bottom
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiNode {
    pub text: String,
    pub content_desc: String,
    pub resource_id: String,
    pub class_name: String,
    pub package: String,
    pub clickable: bool,
    pub scrollable: bool,
    pub checkable: bool,
    pub checked: bool,
    pub focused: bool,
    pub bounds: Bounds,
}

/// One observation of the device UI: every node of a hierarchy dump in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Screen {
    nodes: Vec<UiNode>,
}

impl Screen {
    pub fn new(nodes: Vec<UiNode>) -> Self {
        Self { nodes }
    }

    pub fn parse(xml: &str) -> Result<Self, String> {
        parse_hierarchy(xml).map(Self::new)
    }

    pub fn nodes(&self) -> &[UiNode] {
        &self.nodes
    }

    pub fn find(&self, selector: &Selector) -> Option<&UiNode> {
        let mut matches = self.nodes.iter().filter(|node| selector.matches(node));
        if let Some(anchor) = selector.anchor() {
            let anchor = self.find(anchor)?.bounds;
            return matches
                .filter(|node| node.bounds.left >= anchor.right)
                .filter(|node| node.bounds.overlaps_vertically(&anchor))
                .min_by_key(|node| node.bounds.left - anchor.right);
        }
        match selector.pick() {
            Pick::First => matches.next(),
            Pick::Last => matches.last(),
        }
    }

    pub fn exists(&self, selector: &Selector) -> bool {
        self.find(selector).is_some()
    }
}

fn unescape_xml(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find('&') {
        output.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find(';') else {
            output.push_str(tail);
            return output;
        };
        let entity = &tail[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(ch) => {
                output.push(ch);
                rest = &tail[end + 1..];
            }
            None => {
                output.push('&');
                rest = &tail[1..];
            }
        }
    }
    output.push_str(rest);
    output
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> &'a str {
    attrs
        .iter()
        .find(|(attr_name, _)| attr_name == name)
        .map(|(_, value)| value.as_str())
        .unwrap_or("")
}

fn node_from_attrs(attrs: &[(String, String)]) -> UiNode {
    let flag = |name: &str| attr(attrs, name) == "true";
    UiNode {
        text: unescape_xml(attr(attrs, "text")),
        content_desc: unescape_xml(attr(attrs, "content-desc")),
        resource_id: attr(attrs, "resource-id").to_string(),
        class_name: attr(attrs, "class").to_string(),
        package: attr(attrs, "package").to_string(),
        clickable: flag("clickable"),
        scrollable: flag("scrollable"),
        checkable: flag("checkable"),
        checked: flag("checked"),
        focused: flag("focused"),
        bounds: Bounds::parse(attr(attrs, "bounds")).unwrap_or_default(),
    }
}

/// Parses a uiautomator window dump into its `node` elements. Trailing non-XML output (the
/// "UI hierchary dumped to" banner) is ignored.
pub fn parse_hierarchy(xml: &str) -> Result<Vec<UiNode>, String> {
    let bytes = xml.as_bytes();
    let mut index = 0usize;
    let mut nodes = Vec::new();
    let mut saw_root = false;

    while index < bytes.len() {
        if bytes[index] != b'<' {
            index += 1;
            continue;
        }
        if index + 1 >= bytes.len() {
            break;
        }
        match bytes[index + 1] {
            b'/' => {
                while index < bytes.len() && bytes[index] != b'>' {
                    index += 1;
                }
                index += 1;
            }
            b'!' => {
                index += 2;
                while index + 2 < bytes.len() && &bytes[index..index + 3] != b"-->" {
                    index += 1;
                }
                index = (index + 3).min(bytes.len());
            }
            b'?' => {
                index += 2;
                while index + 1 < bytes.len() && &bytes[index..index + 2] != b"?>" {
                    index += 1;
                }
                index = (index + 2).min(bytes.len());
            }
            _ => {
                let start = index + 1;
                let mut cursor = start;
                while cursor < bytes.len()
                    && bytes[cursor] != b'/'
                    && bytes[cursor] != b'>'
                    && !bytes[cursor].is_ascii_whitespace()
                {
                    cursor += 1;
                }
                let tag_name = &xml[start..cursor];
                let (attrs, next) = parse_attributes(xml, cursor)?;
                index = next;
                match tag_name {
                    "hierarchy" => saw_root = true,
                    "node" => nodes.push(node_from_attrs(&attrs)),
                    _ => {}
                }
            }
        }
    }

    if !saw_root && nodes.is_empty() {
        return Err("UI dump contains no hierarchy".to_string());
    }
    Ok(nodes)
}

/// Reads `name="value"` pairs until the end of the tag; returns them with the index just past
/// the closing `>`.
fn parse_attributes(xml: &str, mut cursor: usize) -> Result<(Vec<(String, String)>, usize), String> {
    let bytes = xml.as_bytes();
    let mut attrs = Vec::new();
    loop {
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() {
            return Err("Unterminated tag".to_string());
        }
        match bytes[cursor] {
            b'>' => return Ok((attrs, cursor + 1)),
            b'/' => {
                cursor += 1;
                if cursor < bytes.len() && bytes[cursor] == b'>' {
                    cursor += 1;
                }
                return Ok((attrs, cursor));
            }
            _ => {}
        }

        let name_start = cursor;
        while cursor < bytes.len() && bytes[cursor] != b'=' && !bytes[cursor].is_ascii_whitespace()
        {
            cursor += 1;
        }
        let name_end = cursor;
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() || bytes[cursor] != b'=' {
            return Err("Malformed attribute assignment".to_string());
        }
        cursor += 1;
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() {
            return Err("Missing attribute value".to_string());
        }
        let quote = bytes[cursor];
        if quote != b'"' && quote != b'\'' {
            return Err("Attribute value must be quoted".to_string());
        }
        cursor += 1;
        let value_start = cursor;
        while cursor < bytes.len() && bytes[cursor] != quote {
            cursor += 1;
        }
        if cursor >= bytes.len() {
            return Err("Unterminated attribute value".to_string());
        }
        attrs.push((
            xml[name_start..name_end].to_string(),
            xml[value_start..cursor].to_string(),
        ));
        cursor += 1;
    }
}
