use std::collections::{BTreeSet, HashMap};

use super::{ClassId, FieldId, MethodId, NameType, Side};
use crate::classfile::access;

/// Where a class entity came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassOrigin {
    /// Decoded from one of the side's input archives.
    Input,
    /// Resolved lazily from a side-specific or shared classpath entry.
    Classpath,
    /// Referenced but not found anywhere; members are synthesized on demand.
    Unknown,
    Array,
    Primitive,
}

/// A record component's backing field and accessor method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordLink {
    pub field: FieldId,
    pub accessor: Option<MethodId>,
}

/// A class, interface, array or primitive type.
#[derive(Clone, Debug)]
pub struct ClassInstance {
    /// JVM type descriptor, e.g. `Lfoo/Bar;`, `[I` or `I`.
    pub(crate) id: String,
    /// Internal name, e.g. `foo/Bar`; arrays and primitives keep descriptor form.
    pub(crate) name: String,
    /// `None` for entities shared by both sides.
    pub(crate) side: Option<Side>,
    pub(crate) origin: ClassOrigin,
    pub(crate) access: u16,
    pub(crate) name_obfuscated: bool,
    pub(crate) matchable: bool,
    pub(crate) signature: Option<String>,
    pub(crate) source_file: Option<String>,
    pub(crate) super_class: Option<ClassId>,
    pub(crate) interfaces: BTreeSet<ClassId>,
    pub(crate) children: BTreeSet<ClassId>,
    pub(crate) implementers: BTreeSet<ClassId>,
    pub(crate) outer_class: Option<ClassId>,
    pub(crate) inner_classes: BTreeSet<ClassId>,
    pub(crate) element_class: Option<ClassId>,
    pub(crate) dims: usize,
    pub(crate) array_classes: BTreeSet<ClassId>,
    pub(crate) methods: Vec<MethodId>,
    pub(crate) fields: Vec<FieldId>,
    pub(crate) method_index: HashMap<String, MethodId>,
    pub(crate) field_index: HashMap<String, FieldId>,
    pub(crate) method_type_refs: BTreeSet<MethodId>,
    pub(crate) field_type_refs: BTreeSet<FieldId>,
    pub(crate) refs_in: BTreeSet<ClassId>,
    pub(crate) refs_out: BTreeSet<ClassId>,
    pub(crate) strings: BTreeSet<String>,
    pub(crate) record_components: Vec<RecordLink>,
    pub(crate) tmp_name: Option<String>,
    pub(crate) mapped_name: Option<String>,
    pub(crate) mapped_comment: Option<String>,
}

impl ClassInstance {
    pub(crate) fn new(id: String, name: String, side: Option<Side>, origin: ClassOrigin) -> Self {
        Self {
            id,
            name,
            side,
            origin,
            access: 0,
            name_obfuscated: false,
            matchable: true,
            signature: None,
            source_file: None,
            super_class: None,
            interfaces: BTreeSet::new(),
            children: BTreeSet::new(),
            implementers: BTreeSet::new(),
            outer_class: None,
            inner_classes: BTreeSet::new(),
            element_class: None,
            dims: 0,
            array_classes: BTreeSet::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            method_index: HashMap::new(),
            field_index: HashMap::new(),
            method_type_refs: BTreeSet::new(),
            field_type_refs: BTreeSet::new(),
            refs_in: BTreeSet::new(),
            refs_out: BTreeSet::new(),
            strings: BTreeSet::new(),
            record_components: Vec::new(),
            tmp_name: None,
            mapped_name: None,
            mapped_comment: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name under the given resolution mode.
    pub fn display_name(&self, names: NameType) -> Option<&str> {
        resolve_name(
            &self.name,
            self.tmp_name.as_deref(),
            self.mapped_name.as_deref(),
            names,
        )
    }

    /// Simple name after the last package separator.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    pub fn side(&self) -> Option<Side> {
        self.side
    }

    pub fn is_shared(&self) -> bool {
        self.side.is_none()
    }

    pub fn origin(&self) -> ClassOrigin {
        self.origin
    }

    pub fn is_input(&self) -> bool {
        self.origin == ClassOrigin::Input
    }

    pub fn is_array(&self) -> bool {
        self.dims > 0
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn access(&self) -> u16 {
        self.access
    }

    pub fn is_interface(&self) -> bool {
        self.access & access::INTERFACE != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access & access::ABSTRACT != 0
    }

    pub fn is_enum(&self) -> bool {
        self.access & access::ENUM != 0
    }

    pub fn is_annotation(&self) -> bool {
        self.access & access::ANNOTATION != 0
    }

    pub fn is_synthetic(&self) -> bool {
        self.access & access::SYNTHETIC != 0
    }

    pub fn is_record(&self) -> bool {
        !self.record_components.is_empty()
    }

    pub fn is_name_obfuscated(&self) -> bool {
        self.name_obfuscated
    }

    pub fn is_matchable(&self) -> bool {
        self.matchable
    }

    pub fn super_class(&self) -> Option<ClassId> {
        self.super_class
    }

    pub fn interfaces(&self) -> &BTreeSet<ClassId> {
        &self.interfaces
    }

    pub fn children(&self) -> &BTreeSet<ClassId> {
        &self.children
    }

    pub fn implementers(&self) -> &BTreeSet<ClassId> {
        &self.implementers
    }

    pub fn outer_class(&self) -> Option<ClassId> {
        self.outer_class
    }

    pub fn inner_classes(&self) -> &BTreeSet<ClassId> {
        &self.inner_classes
    }

    pub fn element_class(&self) -> Option<ClassId> {
        self.element_class
    }

    pub fn array_classes(&self) -> &BTreeSet<ClassId> {
        &self.array_classes
    }

    pub fn methods(&self) -> &[MethodId] {
        &self.methods
    }

    pub fn fields(&self) -> &[FieldId] {
        &self.fields
    }

    /// Look up a declared method by name and descriptor.
    pub fn method(&self, name: &str, desc: &str) -> Option<MethodId> {
        self.method_index.get(&member_key(name, desc)).copied()
    }

    /// Look up a declared field by name and descriptor.
    pub fn field(&self, name: &str, desc: &str) -> Option<FieldId> {
        self.field_index.get(&member_key(name, desc)).copied()
    }

    pub fn strings(&self) -> &BTreeSet<String> {
        &self.strings
    }

    pub fn refs_in(&self) -> &BTreeSet<ClassId> {
        &self.refs_in
    }

    pub fn refs_out(&self) -> &BTreeSet<ClassId> {
        &self.refs_out
    }

    pub fn method_type_refs(&self) -> &BTreeSet<MethodId> {
        &self.method_type_refs
    }

    pub fn field_type_refs(&self) -> &BTreeSet<FieldId> {
        &self.field_type_refs
    }

    pub fn record_components(&self) -> &[RecordLink] {
        &self.record_components
    }

    pub fn mapped_name(&self) -> Option<&str> {
        self.mapped_name.as_deref()
    }

    pub fn mapped_comment(&self) -> Option<&str> {
        self.mapped_comment.as_deref()
    }

    pub fn tmp_name(&self) -> Option<&str> {
        self.tmp_name.as_deref()
    }
}

/// Key of the per-class member indices: `name;;desc`.
pub(crate) fn member_key(name: &str, desc: &str) -> String {
    format!("{name};;{desc}")
}

pub(crate) fn resolve_name<'a>(
    plain: &'a str,
    tmp: Option<&'a str>,
    mapped: Option<&'a str>,
    names: NameType,
) -> Option<&'a str> {
    match names {
        NameType::Plain => Some(plain),
        NameType::Mapped => mapped,
        NameType::Tmp => tmp,
        NameType::MappedPlain => Some(mapped.unwrap_or(plain)),
        NameType::MappedTmpPlain => Some(mapped.or(tmp).unwrap_or(plain)),
    }
}
