use std::fmt;

use regex::Regex;
use scraper::ElementRef;
use tracing::error;

use crate::error::{Result, ScrapeError};

/// How one attribute filter compares against an element's value.
#[derive(Debug, Clone)]
pub enum AttrMatch {
    Exact(String),
    /// Unanchored search, like `pep.+` on `class`.
    Pattern(Regex),
}

impl AttrMatch {
    fn matches(&self, value: &str) -> bool {
        match self {
            AttrMatch::Exact(expected) => value == expected,
            AttrMatch::Pattern(re) => re.is_match(value),
        }
    }
}

/// Tag name plus attribute filters; every filter must match.
#[derive(Debug, Clone)]
pub struct TagQuery {
    name: String,
    attrs: Vec<(String, AttrMatch)>,
}

impl TagQuery {
    pub fn new(name: &str) -> Self {
        TagQuery {
            name: name.to_string(),
            attrs: Vec::new(),
        }
    }

    pub fn attr(mut self, key: &str, value: &str) -> Self {
        self.attrs.push((key.to_string(), AttrMatch::Exact(value.to_string())));
        self
    }

    pub fn attr_matching(mut self, key: &str, pattern: Regex) -> Self {
        self.attrs.push((key.to_string(), AttrMatch::Pattern(pattern)));
        self
    }

    pub fn matches(&self, el: &ElementRef) -> bool {
        let value = el.value();
        if value.name() != self.name {
            return false;
        }
        self.attrs.iter().all(|(key, m)| match value.attr(key) {
            // class is multi-valued: any single token may match, or the whole string
            Some(v) if key == "class" => v.split_whitespace().any(|t| m.matches(t)) || m.matches(v),
            Some(v) => m.matches(v),
            None => false,
        })
    }
}

impl fmt::Display for TagQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, m)) in self.attrs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match m {
                AttrMatch::Exact(v) => write!(f, "{}: {:?}", key, v)?,
                AttrMatch::Pattern(re) => write!(f, "{}: /{}/", key, re.as_str())?,
            }
        }
        write!(f, "}}")
    }
}

/// All descendants of `node` matching `query`, in document order.
pub fn find_all<'a>(node: ElementRef<'a>, query: &TagQuery) -> Vec<ElementRef<'a>> {
    descendants(node).filter(|el| query.matches(el)).collect()
}

/// First matching descendant, or `None` when the caller treats absence as normal.
pub fn find_optional<'a>(node: ElementRef<'a>, query: &TagQuery) -> Option<ElementRef<'a>> {
    descendants(node).find(|el| query.matches(el))
}

/// First matching descendant; absence is logged and fatal for the caller.
pub fn find_tag<'a>(node: ElementRef<'a>, query: &TagQuery) -> Result<ElementRef<'a>> {
    find_optional(node, query).ok_or_else(|| {
        let attrs = query.to_string();
        error!(tag = %query.name, %attrs, "Tag not found");
        ScrapeError::TagNotFound {
            tag: query.name.clone(),
            attrs,
        }
    })
}

pub fn require_attr<'a>(el: &ElementRef<'a>, attr: &str) -> Result<&'a str> {
    el.value().attr(attr).ok_or_else(|| ScrapeError::MissingAttribute {
        tag: el.value().name().to_string(),
        attr: attr.to_string(),
    })
}

/// Concatenated text of every descendant text node.
pub fn node_text(el: &ElementRef) -> String {
    el.text().collect()
}

fn descendants<'a>(node: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    node.descendants().skip(1).filter_map(ElementRef::wrap)
}
