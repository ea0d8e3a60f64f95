//! Minimal namespace-aware element tree over `quick-xml`.
//!
//! The feed documents are small (a few MB at most), so they are read into an
//! owned tree once and then searched with XPath-like descendant lookups.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

use super::ParseError;

#[derive(Debug, Clone, Default)]
pub struct Element {
    pub namespace: Option<String>,
    pub name: String,
    /// Attributes keyed by local name (`xsi:type` is stored as `type`).
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    fn from_start(ns: &ResolveResult<'_>, start: &BytesStart<'_>) -> Result<Self, ParseError> {
        let namespace = match ns {
            ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
            _ => None,
        };
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| ParseError::Xml(e.to_string()))?;
            // Namespace declarations are resolved by the reader already
            if attr.key.as_namespace_binding().is_some() {
                continue;
            }
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| ParseError::Xml(e.to_string()))?
                .into_owned();
            attributes.push((key, value));
        }

        Ok(Self {
            namespace,
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
        })
    }

    #[must_use]
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(namespace)
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Trimmed text content, `None` when empty.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        let text = self.text.trim();
        (!text.is_empty()).then_some(text)
    }

    /// All descendants in document order, excluding `self`.
    #[must_use]
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        let mut stack: Vec<&Element> = self.children.iter().rev().collect();
        while let Some(el) = stack.pop() {
            out.push(el);
            stack.extend(el.children.iter().rev());
        }
        out
    }

    /// First descendant with the given qualified name (`.//ns:name`).
    #[must_use]
    pub fn find(&self, namespace: &str, name: &str) -> Option<&Element> {
        self.descendants().into_iter().find(|e| e.is(namespace, name))
    }

    /// Text of the first matching descendant that has any.
    #[must_use]
    pub fn find_text(&self, namespace: &str, name: &str) -> Option<&str> {
        self.find(namespace, name).and_then(Element::text)
    }

    /// All descendants with the given qualified name.
    #[must_use]
    pub fn find_all(&self, namespace: &str, name: &str) -> Vec<&Element> {
        self.descendants()
            .into_iter()
            .filter(|e| e.is(namespace, name))
            .collect()
    }

    /// Whether this element or any descendant lives in `namespace`.
    #[must_use]
    pub fn uses_namespace(&self, namespace: &str) -> bool {
        self.namespace.as_deref() == Some(namespace)
            || self
                .descendants()
                .iter()
                .any(|e| e.namespace.as_deref() == Some(namespace))
    }
}

/// Parse a document into its root element.
///
/// # Errors
///
/// Returns `ParseError::Xml` for malformed markup or a document without a root.
pub fn parse_document(xml: &[u8]) -> Result<Element, ParseError> {
    let mut reader = NsReader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_resolved_event_into(&mut buf) {
            Ok((ns, Event::Start(start))) => {
                stack.push(Element::from_start(&ns, &start)?);
            }
            Ok((ns, Event::Empty(start))) => {
                let element = Element::from_start(&ns, &start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Ok((_, Event::End(_))) => {
                let Some(element) = stack.pop() else {
                    return Err(ParseError::Xml("unbalanced end tag".to_string()));
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Ok((_, Event::Text(text))) => {
                if let Some(current) = stack.last_mut() {
                    let text = text.unescape().map_err(|e| ParseError::Xml(e.to_string()))?;
                    current.text.push_str(&text);
                }
            }
            Ok((_, Event::CData(data))) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Ok((_, Event::Eof)) => break,
            Ok(_) => {}
            Err(e) => return Err(ParseError::Xml(e.to_string())),
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(ParseError::Xml("unexpected end of document".to_string()));
    }
    root.ok_or_else(|| ParseError::Xml("document has no root element".to_string()))
}
