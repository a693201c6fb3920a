use std::collections::BTreeSet;

use super::class::resolve_name;
use super::{ClassId, FieldId, MethodId, NameType, VarId};
use crate::cfg::FlowShape;
use crate::classfile::access;

/// Numeric constant loaded by a method; floating point values keep their bit pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NumberConstant {
    Int(i64),
    Float(u64),
}

/// A method, including synthesized stubs for unresolved call targets.
#[derive(Clone, Debug)]
pub struct MethodInstance {
    pub(crate) cls: ClassId,
    pub(crate) name: String,
    pub(crate) desc: String,
    pub(crate) access: u16,
    /// `false` for stubs created while resolving calls into missing classes.
    pub(crate) real: bool,
    pub(crate) position: usize,
    pub(crate) name_obfuscated: bool,
    pub(crate) matchable: bool,
    pub(crate) signature: Option<String>,
    pub(crate) args: Vec<VarId>,
    pub(crate) vars: Vec<VarId>,
    pub(crate) ret_type: ClassId,
    pub(crate) parent: Option<MethodId>,
    pub(crate) children: BTreeSet<MethodId>,
    pub(crate) hierarchy: usize,
    pub(crate) refs_in: BTreeSet<MethodId>,
    pub(crate) refs_out: BTreeSet<MethodId>,
    pub(crate) field_reads: BTreeSet<FieldId>,
    pub(crate) field_writes: BTreeSet<FieldId>,
    pub(crate) class_refs: BTreeSet<ClassId>,
    pub(crate) strings: BTreeSet<String>,
    pub(crate) numbers: BTreeSet<NumberConstant>,
    pub(crate) opcodes: Vec<u8>,
    pub(crate) flow: FlowShape,
    pub(crate) tmp_name: Option<String>,
    pub(crate) mapped_name: Option<String>,
    pub(crate) mapped_comment: Option<String>,
}

impl MethodInstance {
    pub(crate) fn new(cls: ClassId, name: String, desc: String, ret_type: ClassId) -> Self {
        Self {
            cls,
            name,
            desc,
            access: 0,
            real: true,
            position: 0,
            name_obfuscated: false,
            matchable: true,
            signature: None,
            args: Vec::new(),
            vars: Vec::new(),
            ret_type,
            parent: None,
            children: BTreeSet::new(),
            hierarchy: usize::MAX,
            refs_in: BTreeSet::new(),
            refs_out: BTreeSet::new(),
            field_reads: BTreeSet::new(),
            field_writes: BTreeSet::new(),
            class_refs: BTreeSet::new(),
            strings: BTreeSet::new(),
            numbers: BTreeSet::new(),
            opcodes: Vec::new(),
            flow: FlowShape::default(),
            tmp_name: None,
            mapped_name: None,
            mapped_comment: None,
        }
    }

    pub fn cls(&self) -> ClassId {
        self.cls
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    /// Member id in `name+desc` form.
    pub fn id(&self) -> String {
        format!("{}{}", self.name, self.desc)
    }

    pub fn display_name(&self, names: NameType) -> Option<&str> {
        resolve_name(
            &self.name,
            self.tmp_name.as_deref(),
            self.mapped_name.as_deref(),
            names,
        )
    }

    pub fn access(&self) -> u16 {
        self.access
    }

    pub fn is_real(&self) -> bool {
        self.real
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_static(&self) -> bool {
        self.access & access::STATIC != 0
    }

    pub fn is_private(&self) -> bool {
        self.access & access::PRIVATE != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access & access::ABSTRACT != 0
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    pub fn is_initializer(&self) -> bool {
        self.name == "<clinit>"
    }

    /// Private, static and special methods never take part in overriding.
    pub fn is_hierarchy_barrier(&self) -> bool {
        self.is_private() || self.is_static() || self.name.starts_with('<')
    }

    pub fn is_name_obfuscated(&self) -> bool {
        self.name_obfuscated
    }

    pub fn is_matchable(&self) -> bool {
        self.matchable
    }

    pub fn args(&self) -> &[VarId] {
        &self.args
    }

    pub fn vars(&self) -> &[VarId] {
        &self.vars
    }

    pub fn ret_type(&self) -> ClassId {
        self.ret_type
    }

    pub fn parent(&self) -> Option<MethodId> {
        self.parent
    }

    pub fn children(&self) -> &BTreeSet<MethodId> {
        &self.children
    }

    pub fn refs_in(&self) -> &BTreeSet<MethodId> {
        &self.refs_in
    }

    pub fn refs_out(&self) -> &BTreeSet<MethodId> {
        &self.refs_out
    }

    pub fn field_reads(&self) -> &BTreeSet<FieldId> {
        &self.field_reads
    }

    pub fn field_writes(&self) -> &BTreeSet<FieldId> {
        &self.field_writes
    }

    pub fn class_refs(&self) -> &BTreeSet<ClassId> {
        &self.class_refs
    }

    pub fn strings(&self) -> &BTreeSet<String> {
        &self.strings
    }

    pub fn numbers(&self) -> &BTreeSet<NumberConstant> {
        &self.numbers
    }

    pub fn opcodes(&self) -> &[u8] {
        &self.opcodes
    }

    pub fn flow(&self) -> &FlowShape {
        &self.flow
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

/// A field, including synthesized stubs for unresolved accesses.
#[derive(Clone, Debug)]
pub struct FieldInstance {
    pub(crate) cls: ClassId,
    pub(crate) name: String,
    pub(crate) desc: String,
    pub(crate) access: u16,
    pub(crate) real: bool,
    pub(crate) position: usize,
    pub(crate) name_obfuscated: bool,
    pub(crate) matchable: bool,
    pub(crate) signature: Option<String>,
    pub(crate) ty: ClassId,
    pub(crate) initial_value: Option<String>,
    pub(crate) readers: BTreeSet<MethodId>,
    pub(crate) writers: BTreeSet<MethodId>,
    pub(crate) tmp_name: Option<String>,
    pub(crate) mapped_name: Option<String>,
    pub(crate) mapped_comment: Option<String>,
}

impl FieldInstance {
    pub(crate) fn new(cls: ClassId, name: String, desc: String, ty: ClassId) -> Self {
        Self {
            cls,
            name,
            desc,
            access: 0,
            real: true,
            position: 0,
            name_obfuscated: false,
            matchable: true,
            signature: None,
            ty,
            initial_value: None,
            readers: BTreeSet::new(),
            writers: BTreeSet::new(),
            tmp_name: None,
            mapped_name: None,
            mapped_comment: None,
        }
    }

    pub fn cls(&self) -> ClassId {
        self.cls
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn id(&self) -> String {
        format!("{};;{}", self.name, self.desc)
    }

    pub fn display_name(&self, names: NameType) -> Option<&str> {
        resolve_name(
            &self.name,
            self.tmp_name.as_deref(),
            self.mapped_name.as_deref(),
            names,
        )
    }

    pub fn access(&self) -> u16 {
        self.access
    }

    pub fn is_real(&self) -> bool {
        self.real
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_static(&self) -> bool {
        self.access & access::STATIC != 0
    }

    pub fn is_name_obfuscated(&self) -> bool {
        self.name_obfuscated
    }

    pub fn is_matchable(&self) -> bool {
        self.matchable
    }

    pub fn ty(&self) -> ClassId {
        self.ty
    }

    pub fn initial_value(&self) -> Option<&str> {
        self.initial_value.as_deref()
    }

    pub fn readers(&self) -> &BTreeSet<MethodId> {
        &self.readers
    }

    pub fn writers(&self) -> &BTreeSet<MethodId> {
        &self.writers
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

/// A method argument or local variable.
#[derive(Clone, Debug)]
pub struct MethodVarInstance {
    pub(crate) method: MethodId,
    pub(crate) is_arg: bool,
    /// Position among the method's arguments or among its locals.
    pub(crate) index: usize,
    /// Slot in the JVM local variable array.
    pub(crate) lv_index: u16,
    /// Row in the `LocalVariableTable`, when the variable came from one.
    pub(crate) lvt_index: Option<usize>,
    pub(crate) ty: ClassId,
    pub(crate) start_insn: u32,
    pub(crate) end_insn: u32,
    pub(crate) name: Option<String>,
    pub(crate) name_obfuscated: bool,
    pub(crate) matchable: bool,
    pub(crate) mapped_name: Option<String>,
    pub(crate) mapped_comment: Option<String>,
}

impl MethodVarInstance {
    pub fn method(&self) -> MethodId {
        self.method
    }

    pub fn is_arg(&self) -> bool {
        self.is_arg
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn lv_index(&self) -> u16 {
        self.lv_index
    }

    pub fn lvt_index(&self) -> Option<usize> {
        self.lvt_index
    }

    pub fn ty(&self) -> ClassId {
        self.ty
    }

    pub fn start_insn(&self) -> u32 {
        self.start_insn
    }

    pub fn end_insn(&self) -> u32 {
        self.end_insn
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Plain name, or a positional placeholder when the bytecode carries none.
    pub fn plain_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None if self.is_arg => format!("arg{}", self.index),
            None => format!("var{}", self.index),
        }
    }

    pub fn is_name_obfuscated(&self) -> bool {
        self.name_obfuscated
    }

    pub fn is_matchable(&self) -> bool {
        self.matchable
    }

    pub fn mapped_name(&self) -> Option<&str> {
        self.mapped_name.as_deref()
    }

    pub fn mapped_comment(&self) -> Option<&str> {
        self.mapped_comment.as_deref()
    }
}
