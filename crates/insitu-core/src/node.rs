//! The [`Node`] value model.
//!
//! A `Node` is a self-describing tree: typed leaves (string, 64-bit
//! integer, 64-bit float, numeric array) and containers (ordered object,
//! list). It is both the wire format handed over by the simulation and the
//! internal snapshot format the registry keeps per channel.
//!
//! Accessors are total and explicit. An integer leaf is never silently
//! read as a float or vice versa; [`Node::as_number`] is the one widening
//! accessor, for schema positions documented as "numeric".

use std::borrow::Cow;
use std::fmt;

use indexmap::IndexMap;

use crate::path;

/// Ordered child map of an object node. Iteration follows insertion order,
/// which is the declaration order on the wire.
pub type NodeMap = IndexMap<String, Node>;

// ── NumericArray ───────────────────────────────────────────────────

/// A homogeneous numeric array leaf.
#[derive(Clone, Debug, PartialEq)]
pub enum NumericArray {
    /// 64-bit signed integers.
    Int64(Vec<i64>),
    /// 64-bit floats.
    Float64(Vec<f64>),
}

impl NumericArray {
    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Self::Int64(v) => v.len(),
            Self::Float64(v) => v.len(),
        }
    }

    /// Whether the array has zero elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the values out as `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            Self::Int64(v) => v.iter().map(|&x| x as f64).collect(),
            Self::Float64(v) => v.clone(),
        }
    }
}

// ── NodeKind ───────────────────────────────────────────────────────

/// Discriminant of a [`Node`], used in diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// [`Node::Null`].
    Null,
    /// [`Node::Bool`].
    Bool,
    /// [`Node::Int`].
    Int,
    /// [`Node::Float`].
    Float,
    /// [`Node::String`].
    String,
    /// [`Node::NumericArray`].
    NumericArray,
    /// [`Node::List`].
    List,
    /// [`Node::Object`].
    Object,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int64",
            Self::Float => "float64",
            Self::String => "string",
            Self::NumericArray => "numeric array",
            Self::List => "list",
            Self::Object => "object",
        };
        f.write_str(s)
    }
}

// ── Node ───────────────────────────────────────────────────────────

/// A hierarchical, self-describing data node.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Node {
    /// An empty node (no value assigned yet).
    #[default]
    Null,
    /// Boolean leaf.
    Bool(bool),
    /// Signed 64-bit integer leaf.
    Int(i64),
    /// 64-bit float leaf.
    Float(f64),
    /// UTF-8 string leaf.
    String(String),
    /// Homogeneous numeric array leaf.
    NumericArray(NumericArray),
    /// Unnamed children.
    List(Vec<Node>),
    /// Named children in declaration order.
    Object(NodeMap),
}

impl Node {
    /// An empty object node.
    pub fn object() -> Self {
        Self::Object(NodeMap::new())
    }

    /// The node's discriminant.
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Null => NodeKind::Null,
            Self::Bool(_) => NodeKind::Bool,
            Self::Int(_) => NodeKind::Int,
            Self::Float(_) => NodeKind::Float,
            Self::String(_) => NodeKind::String,
            Self::NumericArray(_) => NodeKind::NumericArray,
            Self::List(_) => NodeKind::List,
            Self::Object(_) => NodeKind::Object,
        }
    }

    /// Whether this is [`Node::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether this is an object node.
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// Whether this is a list node.
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Whether this is a string leaf.
    pub fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    /// Whether this is an integer leaf.
    pub fn is_int(&self) -> bool {
        matches!(self, Self::Int(_))
    }

    /// Whether this is an integer or float leaf.
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    /// Whether this is a numeric array leaf.
    pub fn is_numeric_array(&self) -> bool {
        matches!(self, Self::NumericArray(_))
    }

    /// The boolean value of a [`Node::Bool`] leaf.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The value of a [`Node::Int`] leaf.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The value of a [`Node::Float`] leaf.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The value of an integer or float leaf, widened to `f64`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The value of a string leaf.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The value of a numeric array leaf.
    pub fn as_numeric_array(&self) -> Option<&NumericArray> {
        match self {
            Self::NumericArray(a) => Some(a),
            _ => None,
        }
    }

    /// Children of a list node.
    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Children of an object node.
    pub fn as_object(&self) -> Option<&NodeMap> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Mutable children of an object node.
    pub fn as_object_mut(&mut self) -> Option<&mut NodeMap> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Direct child by name (objects) or decimal index (lists).
    pub fn child(&self, name: &str) -> Option<&Node> {
        match self {
            Self::Object(map) => map.get(name),
            Self::List(items) => items.get(path::index(name)?),
            _ => None,
        }
    }

    /// Mutable direct child by name (objects) or decimal index (lists).
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        match self {
            Self::Object(map) => map.get_mut(name),
            Self::List(items) => items.get_mut(path::index(name)?),
            _ => None,
        }
    }

    /// Number of direct children (zero for leaves).
    pub fn num_children(&self) -> usize {
        match self {
            Self::Object(map) => map.len(),
            Self::List(items) => items.len(),
            _ => 0,
        }
    }

    /// Iterate `(name, child)` pairs.
    ///
    /// Object children yield their names; list children yield their
    /// decimal index. Leaves yield nothing.
    pub fn entries(&self) -> Entries<'_> {
        match self {
            Self::Object(map) => Entries::Object(map.iter()),
            Self::List(items) => Entries::List(items.iter().enumerate()),
            _ => Entries::Empty,
        }
    }

    /// Descendant at a `/`-separated path. The empty path is `self`.
    pub fn get_path(&self, path: &str) -> Option<&Node> {
        path::split(path)
            .into_iter()
            .try_fold(self, |node, segment| node.child(segment))
    }

    /// Mutable descendant at a `/`-separated path.
    pub fn get_path_mut(&mut self, path: &str) -> Option<&mut Node> {
        let mut node = self;
        for segment in path::split(path) {
            node = node.child_mut(segment)?;
        }
        Some(node)
    }

    /// Whether a descendant exists at `path`.
    pub fn has_path(&self, path: &str) -> bool {
        self.get_path(path).is_some()
    }

    /// Store `value` at `path`, creating intermediate objects.
    ///
    /// Intermediates that are neither objects nor lists holding the
    /// addressed index are replaced by empty objects. The empty path
    /// replaces `self`.
    pub fn set_path(&mut self, path: &str, value: impl Into<Node>) {
        let segments = path::split(path);
        let Some((last, parents)) = segments.split_last() else {
            *self = value.into();
            return;
        };
        let mut node = self;
        for segment in parents {
            node = node.child_or_insert(segment);
        }
        *node.child_or_insert(last) = value.into();
    }

    /// Remove and return the descendant at `path`.
    ///
    /// Removing an object child preserves the order of its siblings.
    pub fn remove_path(&mut self, path: &str) -> Option<Node> {
        let segments = path::split(path);
        let (last, parents) = segments.split_last()?;
        let mut node = self;
        for segment in parents {
            node = node.child_mut(segment)?;
        }
        match node {
            Self::Object(map) => map.shift_remove(*last),
            Self::List(items) => {
                let i = path::index(last)?;
                (i < items.len()).then(|| items.remove(i))
            }
            _ => None,
        }
    }

    /// Insert a direct child, turning `self` into an object if it is not one.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Node>) {
        if !self.is_object() {
            *self = Self::object();
        }
        if let Self::Object(map) = self {
            map.insert(name.into(), value.into());
        }
    }

    fn child_or_insert(&mut self, segment: &str) -> &mut Node {
        let list_slot = match self {
            Self::List(items) => path::index(segment).filter(|&i| i < items.len()),
            _ => None,
        };
        if list_slot.is_none() && !self.is_object() {
            *self = Self::object();
        }
        match (self, list_slot) {
            (Self::List(items), Some(i)) => &mut items[i],
            (Self::Object(map), _) => map.entry(segment.to_string()).or_default(),
            _ => unreachable!("node is either a list holding the index or an object"),
        }
    }
}

// ── Entries ────────────────────────────────────────────────────────

/// Iterator over `(name, child)` pairs returned by [`Node::entries`].
pub enum Entries<'a> {
    /// Object children.
    Object(indexmap::map::Iter<'a, String, Node>),
    /// List children, named by index.
    List(std::iter::Enumerate<std::slice::Iter<'a, Node>>),
    /// A leaf has no children.
    Empty,
}

impl<'a> Iterator for Entries<'a> {
    type Item = (Cow<'a, str>, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Object(it) => it.next().map(|(k, v)| (Cow::Borrowed(k.as_str()), v)),
            Self::List(it) => it.next().map(|(i, v)| (Cow::Owned(i.to_string()), v)),
            Self::Empty => None,
        }
    }
}

// ── Conversions ────────────────────────────────────────────────────

impl From<bool> for Node {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Node {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Node {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Node {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Node {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Node {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<i64>> for Node {
    fn from(v: Vec<i64>) -> Self {
        Self::NumericArray(NumericArray::Int64(v))
    }
}

impl From<Vec<f64>> for Node {
    fn from(v: Vec<f64>) -> Self {
        Self::NumericArray(NumericArray::Float64(v))
    }
}

impl From<Vec<Node>> for Node {
    fn from(v: Vec<Node>) -> Self {
        Self::List(v)
    }
}

impl From<NodeMap> for Node {
    fn from(v: NodeMap) -> Self {
        Self::Object(v)
    }
}
