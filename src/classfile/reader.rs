use anyhow::{Context, Result};
use jclassfile::attributes::{Attribute, BootstrapMethodRecord, ExceptionRecord};
use jclassfile::class_file::{self, ClassFile};
use jclassfile::constant_pool::ConstantPool;
use jclassfile::fields::FieldInfo;
use jclassfile::methods::MethodInfo;

use super::code::decode_instructions;
use super::{
    Code, Constant, ExceptionHandler, Handle, LocalVar, RawClass, RawField, RawMethod,
    RecordComponent,
};

/// Parse and decode class file bytes in one step.
pub fn parse_class(data: &[u8]) -> Result<RawClass> {
    let class_file = class_file::parse(data).context("invalid class file")?;
    decode_class(&class_file)
}

/// Internal name of the class a parsed class file defines.
pub fn class_name(class_file: &ClassFile) -> Result<String> {
    let pool = Pool::new(class_file.constant_pool());
    Ok(pool.class_name(class_file.this_class())?.to_string())
}

/// Resolve a parsed class file into its owned representation.
pub fn decode_class(class_file: &ClassFile) -> Result<RawClass> {
    let pool = Pool::new(class_file.constant_pool());
    let this_class = class_file.this_class();
    let name = pool.class_name(this_class)?.to_string();
    let super_name = match class_file.super_class() {
        0 => None,
        index => Some(pool.class_name(index)?.to_string()),
    };
    let interfaces = class_file
        .interfaces()
        .iter()
        .map(|&index| pool.class_name(index).map(str::to_string))
        .collect::<Result<Vec<_>>>()?;

    let mut class = RawClass {
        name,
        access: class_file.access_flags().bits(),
        super_name,
        interfaces,
        ..RawClass::default()
    };
    let mut bootstraps: &[BootstrapMethodRecord] = &[];
    let mut enclosing = None;

    for attribute in class_file.attributes() {
        match attribute {
            Attribute::Signature { signature_index } => {
                class.signature = Some(pool.utf8(*signature_index)?.to_string());
            }
            Attribute::SourceFile { sourcefile_index } => {
                class.source_file = Some(pool.utf8(*sourcefile_index)?.to_string());
            }
            Attribute::InnerClasses { classes } => {
                for record in classes {
                    let outer = record.outer_class_info_index();
                    if record.inner_class_info_index() == this_class && outer != 0 {
                        class.outer_name = Some(pool.class_name(outer)?.to_string());
                    }
                }
            }
            Attribute::EnclosingMethod { class_index, .. } => {
                enclosing = Some(pool.class_name(*class_index)?.to_string());
            }
            Attribute::BootstrapMethods { bootstrap_methods } => {
                bootstraps = bootstrap_methods.as_slice();
            }
            Attribute::Record { components } => {
                for component in components {
                    class.record_components.push(RecordComponent {
                        name: pool.utf8(component.name_index())?.to_string(),
                        descriptor: pool.utf8(component.descriptor_index())?.to_string(),
                    });
                }
            }
            _ => {}
        }
    }
    if class.outer_name.is_none() {
        class.outer_name = enclosing;
    }

    for field in class_file.fields() {
        let field = decode_field(field, &pool).with_context(|| format!("in class {}", class.name))?;
        class.fields.push(field);
    }
    for method in class_file.methods() {
        let method = decode_method(method, &pool, bootstraps)
            .with_context(|| format!("in class {}", class.name))?;
        class.methods.push(method);
    }

    Ok(class)
}

fn decode_field(field: &FieldInfo, pool: &Pool<'_>) -> Result<RawField> {
    let mut raw = RawField {
        name: pool.utf8(field.name_index())?.to_string(),
        descriptor: pool.utf8(field.descriptor_index())?.to_string(),
        access: field.access_flags().bits(),
        ..RawField::default()
    };
    for attribute in field.attributes() {
        match attribute {
            Attribute::Signature { signature_index } => {
                raw.signature = Some(pool.utf8(*signature_index)?.to_string());
            }
            Attribute::ConstantValue {
                constantvalue_index,
            } => raw.constant = Some(pool.constant(*constantvalue_index)?),
            _ => {}
        }
    }
    Ok(raw)
}

fn decode_method(
    method: &MethodInfo,
    pool: &Pool<'_>,
    bootstraps: &[BootstrapMethodRecord],
) -> Result<RawMethod> {
    let mut raw = RawMethod {
        name: pool.utf8(method.name_index())?.to_string(),
        descriptor: pool.utf8(method.descriptor_index())?.to_string(),
        access: method.access_flags().bits(),
        ..RawMethod::default()
    };
    for attribute in method.attributes() {
        match attribute {
            Attribute::Signature { signature_index } => {
                raw.signature = Some(pool.utf8(*signature_index)?.to_string());
            }
            Attribute::Code {
                max_locals,
                code,
                exception_table,
                attributes,
                ..
            } => {
                let body = decode_code(*max_locals, code, exception_table, attributes, pool, bootstraps)
                    .with_context(|| format!("failed to decode {}{}", raw.name, raw.descriptor))?;
                raw.code = Some(body);
            }
            _ => {}
        }
    }
    Ok(raw)
}

fn decode_code(
    max_locals: u16,
    bytecode: &[u8],
    exception_table: &[ExceptionRecord],
    attributes: &[Attribute],
    pool: &Pool<'_>,
    bootstraps: &[BootstrapMethodRecord],
) -> Result<Code> {
    let mut exception_handlers = Vec::with_capacity(exception_table.len());
    for record in exception_table {
        let catch_type = match record.catch_type() {
            0 => None,
            index => Some(pool.class_name(index)?.to_string()),
        };
        exception_handlers.push(ExceptionHandler {
            start_pc: record.start_pc() as u32,
            end_pc: record.end_pc() as u32,
            handler_pc: record.handler_pc() as u32,
            catch_type,
        });
    }

    let mut local_vars = Vec::new();
    for attribute in attributes {
        let Attribute::LocalVariableTable {
            local_variable_table,
        } = attribute
        else {
            continue;
        };
        for record in local_variable_table {
            local_vars.push(LocalVar {
                start_pc: record.start_pc() as u32,
                length: record.length() as u32,
                name: pool.utf8(record.name_index())?.to_string(),
                descriptor: pool.utf8(record.descriptor_index())?.to_string(),
                index: record.index(),
            });
        }
    }

    Ok(Code {
        max_locals,
        bytecode: bytecode.to_vec(),
        instructions: decode_instructions(bytecode, pool, bootstraps)?,
        exception_handlers,
        local_vars,
    })
}

/// Resolved member reference (`Fieldref`, `Methodref`, `InterfaceMethodref`).
pub(crate) struct MemberRef {
    pub(crate) owner: String,
    pub(crate) name: String,
    pub(crate) descriptor: String,
    pub(crate) is_interface: bool,
}

/// Typed lookups into a parsed constant pool.
pub(crate) struct Pool<'a> {
    entries: &'a [ConstantPool],
}

impl<'a> Pool<'a> {
    pub(crate) fn new(entries: &'a [ConstantPool]) -> Self {
        Self { entries }
    }

    fn entry(&self, index: u16) -> Result<&'a ConstantPool> {
        self.entries
            .get(index as usize)
            .with_context(|| format!("constant pool index {index} out of range"))
    }

    pub(crate) fn utf8(&self, index: u16) -> Result<&'a str> {
        match self.entry(index)? {
            ConstantPool::Utf8 { value } => Ok(value.as_str()),
            other => anyhow::bail!("expected Utf8 at {index}, found {other:?}"),
        }
    }

    pub(crate) fn class_name(&self, index: u16) -> Result<&'a str> {
        match self.entry(index)? {
            ConstantPool::Class { name_index } => self.utf8(*name_index),
            other => anyhow::bail!("expected Class at {index}, found {other:?}"),
        }
    }

    fn name_and_type(&self, index: u16) -> Result<(&'a str, &'a str)> {
        match self.entry(index)? {
            ConstantPool::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            other => anyhow::bail!("expected NameAndType at {index}, found {other:?}"),
        }
    }

    pub(crate) fn member_ref(&self, index: u16) -> Result<MemberRef> {
        let (class_index, nat_index, is_interface) = match self.entry(index)? {
            ConstantPool::Fieldref {
                class_index,
                name_and_type_index,
            }
            | ConstantPool::Methodref {
                class_index,
                name_and_type_index,
            } => (*class_index, *name_and_type_index, false),
            ConstantPool::InterfaceMethodref {
                class_index,
                name_and_type_index,
            } => (*class_index, *name_and_type_index, true),
            other => anyhow::bail!("expected member reference at {index}, found {other:?}"),
        };
        let (name, descriptor) = self.name_and_type(nat_index)?;
        Ok(MemberRef {
            owner: self.class_name(class_index)?.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            is_interface,
        })
    }

    /// Bootstrap method index, name and descriptor of an `InvokeDynamic` entry.
    pub(crate) fn invoke_dynamic(&self, index: u16) -> Result<(u16, String, String)> {
        match self.entry(index)? {
            ConstantPool::InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => {
                let (name, descriptor) = self.name_and_type(*name_and_type_index)?;
                Ok((
                    *bootstrap_method_attr_index,
                    name.to_string(),
                    descriptor.to_string(),
                ))
            }
            other => anyhow::bail!("expected InvokeDynamic at {index}, found {other:?}"),
        }
    }

    pub(crate) fn handle(&self, index: u16) -> Result<Handle> {
        match self.entry(index)? {
            ConstantPool::MethodHandle {
                reference_kind,
                reference_index,
            } => {
                let member = self.member_ref(*reference_index)?;
                Ok(Handle {
                    kind: *reference_kind,
                    owner: member.owner,
                    name: member.name,
                    descriptor: member.descriptor,
                    is_interface: member.is_interface,
                })
            }
            other => anyhow::bail!("expected MethodHandle at {index}, found {other:?}"),
        }
    }

    pub(crate) fn constant(&self, index: u16) -> Result<Constant> {
        let constant = match self.entry(index)? {
            ConstantPool::Integer { value } => Constant::Int(*value),
            ConstantPool::Float { value } => Constant::Float(*value),
            ConstantPool::Long { value } => Constant::Long(*value),
            ConstantPool::Double { value } => Constant::Double(*value),
            ConstantPool::String { string_index } => {
                Constant::String(self.utf8(*string_index)?.to_string())
            }
            ConstantPool::Class { name_index } => Constant::Class(self.utf8(*name_index)?.to_string()),
            ConstantPool::MethodType { descriptor_index } => {
                Constant::MethodType(self.utf8(*descriptor_index)?.to_string())
            }
            ConstantPool::MethodHandle { .. } => Constant::Handle(self.handle(index)?),
            ConstantPool::Dynamic { .. } => Constant::Dynamic,
            other => anyhow::bail!("entry {index} is not loadable: {other:?}"),
        };
        Ok(constant)
    }
}
