//! XML response documents: 207 multistatus and LOCK lock discovery.
//!
//! Both documents start with an XML declaration, declare every namespace
//! once on the root element, and end with `\r\n`.
use std::collections::BTreeMap;

use bytes::Bytes;
use http::StatusCode;
use xml::common::XmlVersion;
use xml::writer::{EmitterConfig, EventWriter, XmlEvent};
use xmltree::Element;

use crate::errors::DavResult;
use crate::locks::DavLock;
use crate::props::{activelock, assign_prefixes, Property, PropertyIdentifier, PropertyValue};
use crate::util::MemBuffer;
use crate::xmltree_ext::ElementExt;

/// One `<D:response>` of a PROPFIND answer.
#[derive(Debug, Clone)]
pub(crate) enum PropResponse {
    /// `<propname/>`: just the identifiers, all with status 200.
    Names {
        href: String,
        ids: Vec<PropertyIdentifier>,
    },
    /// `<allprop/>` or `<prop>`: found values, plus the requested
    /// identifiers the resource does not have.
    Values {
        href: String,
        found: Vec<Property>,
        missing: Vec<PropertyIdentifier>,
    },
}

impl PropResponse {
    fn ids(&self) -> Box<dyn Iterator<Item = &PropertyIdentifier> + '_> {
        match self {
            PropResponse::Names { ids, .. } => Box::new(ids.iter()),
            PropResponse::Values { found, missing, .. } => {
                Box::new(found.iter().map(|p| &p.id).chain(missing.iter()))
            }
        }
    }
}

fn status_line(status: StatusCode) -> String {
    format!(
        "HTTP/1.1 {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    )
}

fn new_writer() -> EventWriter<MemBuffer> {
    EventWriter::new_with_config(MemBuffer::new(), EmitterConfig::new().perform_indent(false))
}

fn start_document(xw: &mut EventWriter<MemBuffer>) -> xml::writer::Result<()> {
    xw.write(XmlEvent::StartDocument {
        version: XmlVersion::Version10,
        encoding: Some("utf-8"),
        standalone: None,
    })
}

fn finish(xw: EventWriter<MemBuffer>) -> Bytes {
    let mut buf = xw.into_inner();
    let mut data = buf.take().to_vec();
    data.extend_from_slice(b"\r\n");
    Bytes::from(data)
}

// the qualified element name of a property.
fn qname(id: &PropertyIdentifier, prefixes: &BTreeMap<String, String>) -> String {
    match prefixes.get(&id.namespace) {
        Some(prefix) => format!("{}:{}", prefix, id.name),
        None => id.name.clone(),
    }
}

fn write_empty(
    xw: &mut EventWriter<MemBuffer>,
    id: &PropertyIdentifier,
    prefixes: &BTreeMap<String, String>,
) -> xml::writer::Result<()> {
    let name = qname(id, prefixes);
    xw.write(XmlEvent::start_element(name.as_str()))?;
    xw.write(XmlEvent::end_element())
}

fn write_prop(
    xw: &mut EventWriter<MemBuffer>,
    prop: &Property,
    prefixes: &BTreeMap<String, String>,
) -> xml::writer::Result<()> {
    let name = qname(&prop.id, prefixes);
    xw.write(XmlEvent::start_element(name.as_str()))?;
    match prop.value {
        PropertyValue::Text(ref t) => {
            if !t.is_empty() {
                xw.write(XmlEvent::characters(t))?;
            }
        }
        PropertyValue::Xml(ref elems) => {
            for e in elems {
                e.write_ev(xw)?;
            }
        }
    }
    xw.write(XmlEvent::end_element())
}

// <D:propstat><D:prop>...</D:prop><D:status>...</D:status></D:propstat>
fn write_propstat<F>(
    xw: &mut EventWriter<MemBuffer>,
    status: StatusCode,
    body: F,
) -> xml::writer::Result<()>
where
    F: FnOnce(&mut EventWriter<MemBuffer>) -> xml::writer::Result<()>,
{
    xw.write(XmlEvent::start_element("D:propstat"))?;
    xw.write(XmlEvent::start_element("D:prop"))?;
    body(xw)?;
    xw.write(XmlEvent::end_element())?;
    xw.write(XmlEvent::start_element("D:status"))?;
    xw.write(XmlEvent::characters(&status_line(status)))?;
    xw.write(XmlEvent::end_element())?;
    xw.write(XmlEvent::end_element())
}

/// Serialize a PROPFIND answer.
pub(crate) fn multistatus(responses: &[PropResponse]) -> DavResult<Bytes> {
    let prefixes = assign_prefixes(responses.iter().flat_map(|r| r.ids()));

    let mut xw = new_writer();
    start_document(&mut xw)?;
    let mut start = XmlEvent::start_element("D:multistatus");
    for (ns, prefix) in &prefixes {
        start = start.ns(prefix.as_str(), ns.as_str());
    }
    xw.write(start)?;

    for resp in responses {
        xw.write(XmlEvent::start_element("D:response"))?;
        let href = match resp {
            PropResponse::Names { href, .. } | PropResponse::Values { href, .. } => href,
        };
        xw.write(XmlEvent::start_element("D:href"))?;
        xw.write(XmlEvent::characters(href))?;
        xw.write(XmlEvent::end_element())?;

        match resp {
            PropResponse::Names { ids, .. } => {
                write_propstat(&mut xw, StatusCode::OK, |xw| {
                    ids.iter().try_for_each(|id| write_empty(xw, id, &prefixes))
                })?;
            }
            PropResponse::Values { found, missing, .. } => {
                write_propstat(&mut xw, StatusCode::OK, |xw| {
                    found.iter().try_for_each(|p| write_prop(xw, p, &prefixes))
                })?;
                if !missing.is_empty() {
                    write_propstat(&mut xw, StatusCode::NOT_FOUND, |xw| {
                        missing.iter().try_for_each(|id| write_empty(xw, id, &prefixes))
                    })?;
                }
            }
        }
        xw.write(XmlEvent::end_element())?;
    }

    xw.write(XmlEvent::end_element())?;
    Ok(finish(xw))
}

/// Serialize the body of a LOCK answer.
pub(crate) fn lockdiscovery(lock: &DavLock, prefix: &str) -> DavResult<Bytes> {
    let mut xw = new_writer();
    start_document(&mut xw)?;
    xw.write(XmlEvent::start_element("D:prop").ns("D", "DAV:"))?;
    let discovery = Element::new2("D:lockdiscovery").child(activelock(lock, prefix));
    discovery.write_ev(&mut xw)?;
    xw.write(XmlEvent::end_element())?;
    Ok(finish(xw))
}
