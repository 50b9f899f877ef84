use std::borrow::Cow;
use std::io::Write;

use xml::writer::{EventWriter, XmlEvent};
use xmltree::{Element, XMLNode};

use crate::errors::{DavError, DavResult};
use crate::props::DAV_NS;

pub(crate) trait ElementExt {
    /// Builder: "D:name" creates an element in the DAV: namespace.
    fn new2<'a, E: Into<&'a str>>(e: E) -> Self;
    /// Builder.
    fn text<T: Into<String>>(self, t: T) -> Self;
    /// Builder.
    fn child(self, e: Element) -> Self;
    /// Parse a request body.
    fn parse2(data: &[u8]) -> DavResult<Element>;
    /// Is this `name` in the DAV: namespace.
    fn is_dav(&self, name: &str) -> bool;
    /// First child element with this name in the DAV: namespace.
    fn dav_child(&self, name: &str) -> Option<&Element>;
    /// Child elements, text and comments are skipped.
    fn child_elems_iter<'a>(&'a self) -> Box<dyn Iterator<Item = &'a Element> + 'a>;
    /// Concatenated text content of this element and its descendants.
    fn text_content(&self) -> String;
    /// Add a child element.
    fn push_element(&mut self, e: Element);
    /// Write this element, including children, to an EventWriter.
    fn write_ev<W: Write>(&self, emitter: &mut EventWriter<W>) -> xml::writer::Result<()>;
}

impl ElementExt for Element {
    fn new2<'a, N: Into<&'a str>>(n: N) -> Element {
        let v: Vec<&str> = n.into().splitn(2, ':').collect();
        if v.len() == 1 {
            Element::new(v[0])
        } else {
            let mut e = Element::new(v[1]);
            e.prefix = Some(v[0].to_string());
            if v[0] == "D" {
                e.namespace = Some(DAV_NS.to_string());
            }
            e
        }
    }

    fn text<S: Into<String>>(mut self, t: S) -> Element {
        self.children.push(XMLNode::Text(t.into()));
        self
    }

    fn child(mut self, e: Element) -> Element {
        self.children.push(XMLNode::Element(e));
        self
    }

    fn parse2(data: &[u8]) -> DavResult<Element> {
        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(DavError::XmlReadError);
        }
        Element::parse(data).map_err(|e| {
            debug!("xml parse error: {}", e);
            DavError::XmlReadError
        })
    }

    fn is_dav(&self, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(DAV_NS)
    }

    fn dav_child(&self, name: &str) -> Option<&Element> {
        self.child_elems_iter().find(|e| e.is_dav(name))
    }

    fn child_elems_iter<'a>(&'a self) -> Box<dyn Iterator<Item = &'a Element> + 'a> {
        Box::new(self.children.iter().filter_map(|n| n.as_element()))
    }

    fn text_content(&self) -> String {
        let mut s = String::new();
        for node in &self.children {
            match node {
                XMLNode::Text(t) | XMLNode::CData(t) => s.push_str(t),
                XMLNode::Element(e) => s.push_str(&e.text_content()),
                _ => {}
            }
        }
        s
    }

    fn push_element(&mut self, e: Element) {
        self.children.push(XMLNode::Element(e));
    }

    fn write_ev<W: Write>(&self, emitter: &mut EventWriter<W>) -> xml::writer::Result<()> {
        let name: Cow<str> = match self.prefix {
            Some(ref p) => Cow::Owned(format!("{}:{}", p, self.name)),
            None => Cow::Borrowed(&self.name),
        };
        let mut start = XmlEvent::start_element(name.as_ref());
        for (k, v) in &self.attributes {
            start = start.attr(k.as_str(), v.as_str());
        }
        emitter.write(start)?;
        for node in &self.children {
            match node {
                XMLNode::Element(e) => e.write_ev(emitter)?,
                XMLNode::Text(t) => emitter.write(XmlEvent::characters(t))?,
                XMLNode::CData(t) => emitter.write(XmlEvent::cdata(t))?,
                XMLNode::Comment(_) | XMLNode::ProcessingInstruction(..) => {}
            }
        }
        emitter.write(XmlEvent::end_element())
    }
}
