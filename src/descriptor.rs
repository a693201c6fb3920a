use std::str::FromStr;

use anyhow::{Context, Result};
use jdescriptor::TypeDescriptor;

/// Method descriptor split into argument and return descriptors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub args: Vec<String>,
    pub ret: String,
}

impl MethodDescriptor {
    pub fn parse(descriptor: &str) -> Result<Self> {
        let parsed = jdescriptor::MethodDescriptor::from_str(descriptor)
            .with_context(|| format!("bad method descriptor {descriptor}"))?;
        Ok(Self {
            args: parsed
                .parameter_types()
                .iter()
                .map(ToString::to_string)
                .collect(),
            ret: parsed.return_type().to_string(),
        })
    }
}

/// Local variable slots occupied by a value of this type.
pub fn slot_size(desc: &str) -> u16 {
    match TypeDescriptor::from_str(desc) {
        Ok(TypeDescriptor::Long | TypeDescriptor::Double) => 2,
        _ => 1,
    }
}

/// Number of leading `[` in a descriptor.
pub fn array_dims(desc: &str) -> usize {
    match TypeDescriptor::from_str(desc) {
        Ok(TypeDescriptor::Array(_, dims)) => dims as usize,
        _ => 0,
    }
}

/// Descriptor (`Lfoo/Bar;`, `I`, `[I`) for an internal name as it appears in
/// constant pool class entries, where arrays are already in descriptor form.
pub fn class_name_to_descriptor(name: &str) -> String {
    if name.starts_with('[') {
        name.to_string()
    } else {
        TypeDescriptor::Object(name.to_string()).to_string()
    }
}

/// Inverse of [`class_name_to_descriptor`] for object types; arrays and
/// primitives keep their descriptor form.
pub fn descriptor_to_class_name(desc: &str) -> &str {
    desc.strip_prefix('L')
        .and_then(|rest| rest.strip_suffix(';'))
        .unwrap_or(desc)
}

pub fn is_primitive(desc: &str) -> bool {
    desc.len() == 1
        && matches!(
            TypeDescriptor::from_str(desc),
            Ok(ty) if !matches!(ty, TypeDescriptor::Array(..) | TypeDescriptor::Object(_))
        )
}

/// Java source spelling of a descriptor, used for rendering.
pub fn java_type_name(desc: &str) -> String {
    match TypeDescriptor::from_str(desc) {
        Ok(ty) => java_spelling(&ty),
        Err(_) => descriptor_to_class_name(desc).replace('/', "."),
    }
}

fn java_spelling(ty: &TypeDescriptor) -> String {
    let name = match ty {
        TypeDescriptor::Byte => "byte",
        TypeDescriptor::Char => "char",
        TypeDescriptor::Double => "double",
        TypeDescriptor::Float => "float",
        TypeDescriptor::Integer => "int",
        TypeDescriptor::Long => "long",
        TypeDescriptor::Short => "short",
        TypeDescriptor::Boolean => "boolean",
        TypeDescriptor::Void => "void",
        TypeDescriptor::Object(name) => return name.replace('/', "."),
        TypeDescriptor::Array(element, dims) => {
            return format!("{}{}", java_spelling(element), "[]".repeat(*dims as usize));
        }
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_method_descriptor_arguments_and_return() {
        let desc = MethodDescriptor::parse("(I[JLjava/lang/String;[[La/B;)Z").expect("parse");
        assert_eq!(
            vec!["I", "[J", "Ljava/lang/String;", "[[La/B;"],
            desc.args.iter().map(String::as_str).collect::<Vec<_>>()
        );
        assert_eq!("Z", desc.ret);
    }

    #[test]
    fn rejects_malformed_method_descriptors() {
        assert!(MethodDescriptor::parse("I)V").is_err());
        assert!(MethodDescriptor::parse("(Q)V").is_err());
        assert!(MethodDescriptor::parse("(La/B)V").is_err());
    }

    #[test]
    fn converts_between_names_and_descriptors() {
        assert_eq!("La/B;", class_name_to_descriptor("a/B"));
        assert_eq!("[I", class_name_to_descriptor("[I"));
        assert_eq!("a/B", descriptor_to_class_name("La/B;"));
        assert_eq!(2, array_dims("[[La/B;"));
        assert_eq!(0, array_dims("La/B;"));
        assert_eq!("a.B[][]", java_type_name("[[La/B;"));
        assert_eq!("int", java_type_name("I"));
        assert_eq!(2, slot_size("J"));
        assert_eq!(1, slot_size("[J"));
        assert!(is_primitive("Z"));
        assert!(!is_primitive("[Z"));
    }
}
