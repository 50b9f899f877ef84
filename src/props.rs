//! Property model.
//!
//! Live properties are computed from an [`Entity`] every time they are
//! asked for. Dead properties are stored verbatim by the store and only
//! ever changed through PROPPATCH.
use std::collections::BTreeMap;
use std::fmt;

use xmltree::Element;

use crate::locks::{DavLock, LockScope};
use crate::store::Entity;
use crate::util::systemtime_to_httpdate;
use crate::xmltree_ext::ElementExt;

/// The namespace of live and protocol properties.
pub const DAV_NS: &str = "DAV:";

/// Prefix that is always bound to [`DAV_NS`].
pub const DAV_PREFIX: &str = "D";

/// Names of the computed properties, all in the `DAV:` namespace.
pub(crate) const LIVE_PROPS: &[&str] = &[
    "displayname",
    "getcontentlength",
    "getlastmodified",
    "resourcetype",
    "getetag",
    "supportedlock",
    "lockdiscovery",
];

/// Property name. Ordered by namespace first, then name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyIdentifier {
    pub namespace: String,
    pub name: String,
}

impl PropertyIdentifier {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> PropertyIdentifier {
        PropertyIdentifier {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn dav(name: &str) -> PropertyIdentifier {
        PropertyIdentifier::new(DAV_NS, name)
    }

    /// Properties in the `DAV:` namespace belong to the server.
    pub fn is_protected(&self) -> bool {
        self.namespace == DAV_NS
    }

    pub(crate) fn from_element(elem: &Element) -> PropertyIdentifier {
        PropertyIdentifier::new(elem.namespace.clone().unwrap_or_default(), elem.name.clone())
    }
}

impl fmt::Display for PropertyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.name)
    }
}

/// Value of a property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Plain text, escaped when written.
    Text(String),
    /// Child elements. Used for live properties with structure.
    Xml(Vec<Element>),
}

/// A property with its value.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub id: PropertyIdentifier,
    pub value: PropertyValue,
}

impl Property {
    /// A dead property with a text value.
    pub fn text(id: PropertyIdentifier, value: impl Into<String>) -> Property {
        Property {
            id,
            value: PropertyValue::Text(value.into()),
        }
    }

    fn xml(name: &str, elems: Vec<Element>) -> Property {
        Property {
            id: PropertyIdentifier::dav(name),
            value: PropertyValue::Xml(elems),
        }
    }
}

// <D:lockentry> for one scope.
fn lockentry(scope: &str) -> Element {
    let mut entry = Element::new2("D:lockentry");
    entry.push_element(Element::new2("D:lockscope").child(Element::new2(scope)));
    entry.push_element(Element::new2("D:locktype").child(Element::new2("D:write")));
    entry
}

/// `<D:activelock>` describing `lock`, used by lockdiscovery.
pub(crate) fn activelock(lock: &DavLock, prefix: &str) -> Element {
    let scope = match lock.scope {
        LockScope::Exclusive => "D:exclusive",
        LockScope::Shared => "D:shared",
    };
    let timeout = match lock.timeout {
        Some(secs) => format!("Second-{}", secs),
        None => "Infinite".to_string(),
    };
    let mut actlock = Element::new2("D:activelock");
    actlock.push_element(Element::new2("D:locktype").child(Element::new2("D:write")));
    actlock.push_element(Element::new2("D:lockscope").child(Element::new2(scope)));
    actlock.push_element(Element::new2("D:depth").text(lock.depth.as_str()));
    if let Some(ref owner) = lock.owner {
        actlock.push_element(Element::new2("D:owner").text(owner.clone()));
    }
    actlock.push_element(Element::new2("D:timeout").text(timeout));
    actlock.push_element(
        Element::new2("D:locktoken").child(Element::new2("D:href").text(lock.token_urn())),
    );
    actlock.push_element(
        Element::new2("D:lockroot")
            .child(Element::new2("D:href").text(lock.root.with_prefix(prefix, false))),
    );
    actlock
}

/// Compute the live properties of an entity.
///
/// `getetag` is only present for items the store supplies a hash for.
/// `prefix` is needed to render hrefs inside `lockdiscovery`.
pub fn live_properties(entity: &Entity, prefix: &str) -> Vec<Property> {
    let mut props = Vec::new();
    props.push(Property::text(
        PropertyIdentifier::dav("displayname"),
        entity.name(),
    ));
    props.push(Property::text(
        PropertyIdentifier::dav("getcontentlength"),
        entity.size.to_string(),
    ));
    props.push(Property::text(
        PropertyIdentifier::dav("getlastmodified"),
        systemtime_to_httpdate(entity.last_modified),
    ));
    let rtype = if entity.is_collection() {
        vec![Element::new2("D:collection")]
    } else {
        Vec::new()
    };
    props.push(Property::xml("resourcetype", rtype));
    if let (true, Some(etag)) = (entity.is_item(), entity.etag.as_ref()) {
        props.push(Property::text(
            PropertyIdentifier::dav("getetag"),
            format!("\"{}\"", etag),
        ));
    }
    props.push(Property::xml(
        "supportedlock",
        vec![lockentry("D:exclusive"), lockentry("D:shared")],
    ));
    let discovery = match entity.lock {
        Some(ref lock) => vec![activelock(lock, prefix)],
        None => Vec::new(),
    };
    props.push(Property::xml("lockdiscovery", discovery));
    props
}

/// Live properties first, then the dead ones. Live always wins if an
/// identifier shows up twice.
pub fn merge_properties(live: Vec<Property>, dead: Vec<Property>) -> Vec<Property> {
    let mut props = live;
    for prop in dead {
        if !props.iter().any(|p| p.id == prop.id) {
            props.push(prop);
        }
    }
    props
}

/// Set or replace a dead property.
pub(crate) fn upsert(props: &mut Vec<Property>, prop: Property) {
    match props.iter_mut().find(|p| p.id == prop.id) {
        Some(p) => *p = prop,
        None => props.push(prop),
    }
}

/// Remove a dead property, if present.
pub(crate) fn remove(props: &mut Vec<Property>, id: &PropertyIdentifier) {
    props.retain(|p| p.id != *id);
}

/// Assign XML prefixes to namespaces.
///
/// `DAV:` is always `D`. Every other distinct namespace gets `ns<N>`,
/// where N is the namespace's position in the sorted list of distinct
/// namespaces (`DAV:` included). Sorting first makes the result depend
/// only on the set of identifiers, not on their order. The empty
/// namespace gets no prefix.
///
/// The index counts `DAV:` and the empty namespace too. A response without
/// any `DAV:` property numbers from `ns0`, one with `DAV:` properties from
/// `ns1`, and an empty namespace leaves a gap.
pub fn assign_prefixes<'a, I>(ids: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = &'a PropertyIdentifier>,
{
    let mut namespaces: Vec<&str> = ids.into_iter().map(|id| id.namespace.as_str()).collect();
    namespaces.sort_unstable();
    namespaces.dedup();

    let mut map = BTreeMap::new();
    map.insert(DAV_NS.to_string(), DAV_PREFIX.to_string());
    for (idx, ns) in namespaces.into_iter().enumerate() {
        if ns == DAV_NS || ns.is_empty() {
            continue;
        }
        map.insert(ns.to_string(), format!("ns{}", idx));
    }
    map
}
