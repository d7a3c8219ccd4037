//! Field-level view of configuration records.
//!
//! # Responsibilities
//! - Describe a record's fields in declaration order ([`Record`])
//! - Expose any field value as a typed, borrowed [`FieldValue`] ([`Inspect`])
//! - Give identity-carrying access to records behind shared pointers
//!   ([`Referent`], [`Reference`])
//!
//! # Design Decisions
//! - Field enumeration is generated at compile time by `#[derive(Record)]`
//! - Values are borrowed, never cloned, so validating large configs is cheap
//! - Reference identity is the address of the shared allocation, which is
//!   known without taking any lock the allocation may hold

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::BuildHasher;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

/// A struct whose fields can be enumerated for validation.
///
/// Implemented by `#[derive(Record)]`; hand-written impls must list fields in
/// declaration order.
pub trait Record {
    fn fields(&self) -> Vec<FieldDescriptor<'_>>;

    /// Type name used in diagnostics.
    fn record_name(&self) -> &'static str;
}

/// Anything that can present itself as a [`FieldValue`].
pub trait Inspect {
    fn inspect(&self) -> FieldValue<'_>;
}

/// A record reachable through a shared pointer, possibly behind a lock.
pub trait Referent {
    /// Call `visit` with the record. Implementations that cannot obtain the
    /// record (e.g. a `RefCell` already borrowed mutably) skip the call.
    fn with_record(&self, visit: &mut dyn FnMut(&dyn Record));
}

/// Traversal-time view of one record field.
pub struct FieldDescriptor<'a> {
    pub name: &'static str,
    /// Raw comma-separated rule expressions, e.g. `"required,min=1"`.
    pub rules: &'static str,
    pub value: FieldValue<'a>,
}

impl<'a> FieldDescriptor<'a> {
    pub fn new(name: &'static str, rules: &'static str, value: &'a dyn Inspect) -> Self {
        Self {
            name,
            rules,
            value: value.inspect(),
        }
    }

    /// Rule expressions in declaration order, trimmed, empties dropped.
    pub fn expressions(&self) -> impl Iterator<Item = &'static str> {
        self.rules
            .split(',')
            .map(str::trim)
            .filter(|expr| !expr.is_empty())
    }
}

impl fmt::Debug for FieldDescriptor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("rules", &self.rules)
            .field("value", &self.value)
            .finish()
    }
}

/// Kind of a [`FieldValue`], used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Int,
    Uint,
    Float,
    Char,
    Text,
    Sequence,
    Mapping,
    Optional,
    Record,
    Reference,
    Opaque,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Uint => "uint",
            ValueKind::Float => "float",
            ValueKind::Char => "char",
            ValueKind::Text => "string",
            ValueKind::Sequence => "sequence",
            ValueKind::Mapping => "mapping",
            ValueKind::Optional => "optional",
            ValueKind::Record => "record",
            ValueKind::Reference => "reference",
            ValueKind::Opaque => "opaque",
        };
        f.write_str(name)
    }
}

/// Borrowed, typed view of a field value.
pub enum FieldValue<'a> {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Char(char),
    Text(&'a str),
    Sequence(&'a dyn SequenceView),
    Mapping(&'a dyn MappingView),
    Optional(Option<Box<FieldValue<'a>>>),
    /// A record nested by value.
    Record(&'a dyn Record),
    Reference(Reference<'a>),
    /// A value with no useful view; carries a type description.
    Opaque(&'static str),
}

impl<'a> FieldValue<'a> {
    pub fn kind(&self) -> ValueKind {
        match self {
            FieldValue::Bool(_) => ValueKind::Bool,
            FieldValue::Int(_) => ValueKind::Int,
            FieldValue::Uint(_) => ValueKind::Uint,
            FieldValue::Float(_) => ValueKind::Float,
            FieldValue::Char(_) => ValueKind::Char,
            FieldValue::Text(_) => ValueKind::Text,
            FieldValue::Sequence(_) => ValueKind::Sequence,
            FieldValue::Mapping(_) => ValueKind::Mapping,
            FieldValue::Optional(_) => ValueKind::Optional,
            FieldValue::Record(_) => ValueKind::Record,
            FieldValue::Reference(_) => ValueKind::Reference,
            FieldValue::Opaque(_) => ValueKind::Opaque,
        }
    }

    /// Peel `Option` layers. `None` when the value is absent.
    pub fn present(&self) -> Option<&FieldValue<'a>> {
        match self {
            FieldValue::Optional(None) => None,
            FieldValue::Optional(Some(inner)) => inner.present(),
            other => Some(other),
        }
    }

    /// Numeric value widened to `f64`, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            FieldValue::Int(v) => Some(v as f64),
            FieldValue::Uint(v) => Some(v as f64),
            FieldValue::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&'a str> {
        match *self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Element, entry or character count.
    pub fn len(&self) -> Option<usize> {
        match self {
            FieldValue::Text(s) => Some(s.chars().count()),
            FieldValue::Sequence(seq) => Some(seq.len()),
            FieldValue::Mapping(map) => Some(map.len()),
            _ => None,
        }
    }

    /// Whether this is the zero value of its kind.
    ///
    /// References are never zero; opaque values are treated as set. A record
    /// is zero when every field is.
    pub fn is_zero(&self) -> bool {
        match self {
            FieldValue::Bool(v) => !*v,
            FieldValue::Int(v) => *v == 0,
            FieldValue::Uint(v) => *v == 0,
            FieldValue::Float(v) => *v == 0.0,
            FieldValue::Char(c) => *c == '\0',
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Sequence(seq) => seq.is_empty(),
            FieldValue::Mapping(map) => map.is_empty(),
            FieldValue::Optional(inner) => inner.is_none(),
            FieldValue::Record(record) => record.fields().iter().all(|f| f.value.is_zero()),
            FieldValue::Reference(_) => false,
            FieldValue::Opaque(_) => false,
        }
    }
}

impl fmt::Debug for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(v) => write!(f, "Bool({v})"),
            FieldValue::Int(v) => write!(f, "Int({v})"),
            FieldValue::Uint(v) => write!(f, "Uint({v})"),
            FieldValue::Float(v) => write!(f, "Float({v})"),
            FieldValue::Char(v) => write!(f, "Char({v:?})"),
            FieldValue::Text(v) => write!(f, "Text({v:?})"),
            FieldValue::Sequence(seq) => write!(f, "Sequence(len={})", seq.len()),
            FieldValue::Mapping(map) => write!(f, "Mapping(len={})", map.len()),
            FieldValue::Optional(None) => f.write_str("Optional(None)"),
            FieldValue::Optional(Some(inner)) => write!(f, "Optional({inner:?})"),
            FieldValue::Record(record) => write!(f, "Record({})", record.record_name()),
            FieldValue::Reference(r) => write!(f, "Reference({:#x})", r.identity()),
            FieldValue::Opaque(ty) => write!(f, "Opaque({ty})"),
        }
    }
}

/// A shared pointer to a record, identified by its allocation address.
#[derive(Clone, Copy)]
pub struct Reference<'a> {
    identity: usize,
    target: &'a dyn Referent,
}

impl<'a> Reference<'a> {
    pub fn new(identity: usize, target: &'a dyn Referent) -> Self {
        Self { identity, target }
    }

    pub fn identity(&self) -> usize {
        self.identity
    }

    pub fn target(&self) -> &'a dyn Referent {
        self.target
    }
}

/// Length and items of a sequence-like field.
pub trait SequenceView {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn for_each_item(&self, visit: &mut dyn FnMut(usize, &dyn Inspect));
}

/// Length and entries of a map-like field. Entries are visited in key order.
pub trait MappingView {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn for_each_entry(&self, visit: &mut dyn FnMut(&str, &dyn Inspect));
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

impl Inspect for bool {
    fn inspect(&self) -> FieldValue<'_> {
        FieldValue::Bool(*self)
    }
}

macro_rules! inspect_signed {
    ($($ty:ty),*) => {$(
        impl Inspect for $ty {
            fn inspect(&self) -> FieldValue<'_> {
                FieldValue::Int(*self as i64)
            }
        }
    )*};
}

macro_rules! inspect_unsigned {
    ($($ty:ty),*) => {$(
        impl Inspect for $ty {
            fn inspect(&self) -> FieldValue<'_> {
                FieldValue::Uint(*self as u64)
            }
        }
    )*};
}

inspect_signed!(i8, i16, i32, i64, isize);
inspect_unsigned!(u8, u16, u32, u64, usize);

/// Values outside the `i64` range fall back to a float view.
impl Inspect for i128 {
    fn inspect(&self) -> FieldValue<'_> {
        match i64::try_from(*self) {
            Ok(v) => FieldValue::Int(v),
            Err(_) => FieldValue::Float(*self as f64),
        }
    }
}

impl Inspect for u128 {
    fn inspect(&self) -> FieldValue<'_> {
        match u64::try_from(*self) {
            Ok(v) => FieldValue::Uint(v),
            Err(_) => FieldValue::Float(*self as f64),
        }
    }
}

impl Inspect for f32 {
    fn inspect(&self) -> FieldValue<'_> {
        FieldValue::Float(f64::from(*self))
    }
}

impl Inspect for f64 {
    fn inspect(&self) -> FieldValue<'_> {
        FieldValue::Float(*self)
    }
}

impl Inspect for char {
    fn inspect(&self) -> FieldValue<'_> {
        FieldValue::Char(*self)
    }
}

impl Inspect for String {
    fn inspect(&self) -> FieldValue<'_> {
        FieldValue::Text(self)
    }
}

impl Inspect for Box<str> {
    fn inspect(&self) -> FieldValue<'_> {
        FieldValue::Text(self)
    }
}

impl Inspect for Arc<str> {
    fn inspect(&self) -> FieldValue<'_> {
        FieldValue::Text(self)
    }
}

impl Inspect for Rc<str> {
    fn inspect(&self) -> FieldValue<'_> {
        FieldValue::Text(self)
    }
}

impl Inspect for Cow<'_, str> {
    fn inspect(&self) -> FieldValue<'_> {
        FieldValue::Text(self)
    }
}

/// Seconds, so `min=0.5` reads as half a second.
impl Inspect for Duration {
    fn inspect(&self) -> FieldValue<'_> {
        FieldValue::Float(self.as_secs_f64())
    }
}

macro_rules! inspect_opaque {
    ($($ty:ty => $desc:literal),* $(,)?) => {$(
        impl Inspect for $ty {
            fn inspect(&self) -> FieldValue<'_> {
                FieldValue::Opaque($desc)
            }
        }
    )*};
}

inspect_opaque! {
    IpAddr => "IP address",
    Ipv4Addr => "IPv4 address",
    Ipv6Addr => "IPv6 address",
    SocketAddr => "socket address",
}

impl Inspect for PathBuf {
    fn inspect(&self) -> FieldValue<'_> {
        match self.to_str() {
            Some(s) => FieldValue::Text(s),
            None => FieldValue::Opaque("non-UTF-8 path"),
        }
    }
}

// ---------------------------------------------------------------------------
// Wrappers
// ---------------------------------------------------------------------------

impl<T: Inspect> Inspect for Option<T> {
    fn inspect(&self) -> FieldValue<'_> {
        FieldValue::Optional(self.as_ref().map(|v| Box::new(v.inspect())))
    }
}

/// Boxed values are owned, so they behave like the value itself.
impl<T: Inspect> Inspect for Box<T> {
    fn inspect(&self) -> FieldValue<'_> {
        (**self).inspect()
    }
}

impl<T: Referent> Inspect for Arc<T> {
    fn inspect(&self) -> FieldValue<'_> {
        let identity = Arc::as_ptr(self) as *const () as usize;
        FieldValue::Reference(Reference::new(identity, &**self))
    }
}

impl<T: Referent> Inspect for Rc<T> {
    fn inspect(&self) -> FieldValue<'_> {
        let identity = Rc::as_ptr(self) as *const () as usize;
        FieldValue::Reference(Reference::new(identity, &**self))
    }
}

impl<T: Record> Referent for Mutex<T> {
    fn with_record(&self, visit: &mut dyn FnMut(&dyn Record)) {
        let guard = self.lock().unwrap_or_else(PoisonError::into_inner);
        visit(&*guard)
    }
}

impl<T: Record> Referent for RwLock<T> {
    fn with_record(&self, visit: &mut dyn FnMut(&dyn Record)) {
        let guard = self.read().unwrap_or_else(PoisonError::into_inner);
        visit(&*guard)
    }
}

impl<T: Record> Referent for RefCell<T> {
    fn with_record(&self, visit: &mut dyn FnMut(&dyn Record)) {
        match self.try_borrow() {
            Ok(record) => visit(&*record),
            Err(_) => tracing::warn!(
                record = std::any::type_name::<T>(),
                "Skipping record that is mutably borrowed during validation"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

impl<T: Inspect> SequenceView for [T] {
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn for_each_item(&self, visit: &mut dyn FnMut(usize, &dyn Inspect)) {
        for (i, item) in self.iter().enumerate() {
            visit(i, item);
        }
    }
}

impl<T: Inspect> SequenceView for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn for_each_item(&self, visit: &mut dyn FnMut(usize, &dyn Inspect)) {
        self.as_slice().for_each_item(visit)
    }
}

impl<T: Inspect, const N: usize> SequenceView for [T; N] {
    fn len(&self) -> usize {
        N
    }

    fn for_each_item(&self, visit: &mut dyn FnMut(usize, &dyn Inspect)) {
        self.as_slice().for_each_item(visit)
    }
}

impl<T: Inspect> SequenceView for VecDeque<T> {
    fn len(&self) -> usize {
        VecDeque::len(self)
    }

    fn for_each_item(&self, visit: &mut dyn FnMut(usize, &dyn Inspect)) {
        for (i, item) in self.iter().enumerate() {
            visit(i, item);
        }
    }
}

impl<T: Inspect> SequenceView for BTreeSet<T> {
    fn len(&self) -> usize {
        BTreeSet::len(self)
    }

    fn for_each_item(&self, visit: &mut dyn FnMut(usize, &dyn Inspect)) {
        for (i, item) in self.iter().enumerate() {
            visit(i, item);
        }
    }
}

/// Items are visited in sorted order so `[i]` paths are stable across runs.
impl<T: Inspect + Ord, S: BuildHasher> SequenceView for HashSet<T, S> {
    fn len(&self) -> usize {
        HashSet::len(self)
    }

    fn for_each_item(&self, visit: &mut dyn FnMut(usize, &dyn Inspect)) {
        let mut items: Vec<&T> = self.iter().collect();
        items.sort();
        for (i, item) in items.into_iter().enumerate() {
            visit(i, item);
        }
    }
}

impl<K: fmt::Display, V: Inspect> MappingView for BTreeMap<K, V> {
    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn for_each_entry(&self, visit: &mut dyn FnMut(&str, &dyn Inspect)) {
        for (key, value) in self {
            visit(&key.to_string(), value);
        }
    }
}

impl<K: fmt::Display, V: Inspect, S: BuildHasher> MappingView for HashMap<K, V, S> {
    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn for_each_entry(&self, visit: &mut dyn FnMut(&str, &dyn Inspect)) {
        let mut entries: Vec<(String, &V)> =
            self.iter().map(|(k, v)| (k.to_string(), v)).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, value) in entries {
            visit(&key, value);
        }
    }
}

macro_rules! inspect_sequence {
    ($($ty:ty => [$($gen:tt)*]),* $(,)?) => {$(
        impl<$($gen)*> Inspect for $ty {
            fn inspect(&self) -> FieldValue<'_> {
                FieldValue::Sequence(self)
            }
        }
    )*};
}

inspect_sequence! {
    Vec<T> => [T: Inspect],
    VecDeque<T> => [T: Inspect],
    BTreeSet<T> => [T: Inspect],
    HashSet<T, S> => [T: Inspect + Ord, S: BuildHasher],
    [T; N] => [T: Inspect, const N: usize],
}

impl<K: fmt::Display, V: Inspect> Inspect for BTreeMap<K, V> {
    fn inspect(&self) -> FieldValue<'_> {
        FieldValue::Mapping(self)
    }
}

impl<K: fmt::Display, V: Inspect, S: BuildHasher> Inspect for HashMap<K, V, S> {
    fn inspect(&self) -> FieldValue<'_> {
        FieldValue::Mapping(self)
    }
}
