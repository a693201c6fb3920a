use std::fmt::Write as _;

use anyhow::Result;

use crate::classfile::access;
use crate::descriptor::java_type_name;
use crate::env::ClassEnvironment;
use crate::model::{ClassId, ClassOrigin, EntityRef, NameType};

/// Turns a class into source text under a name resolution mode. Never mutates the model.
pub trait SourceRenderer {
    fn render(&self, env: &ClassEnvironment, class: ClassId, names: NameType) -> Result<String>;
}

/// Renders declarations only: class header, fields and method signatures.
#[derive(Clone, Copy, Debug, Default)]
pub struct SkeletonRenderer;

impl SourceRenderer for SkeletonRenderer {
    fn render(&self, env: &ClassEnvironment, class: ClassId, names: NameType) -> Result<String> {
        let instance = env.class(class);
        let mut out = String::new();

        if let Some(comment) = &instance.mapped_comment {
            writeln!(out, "/** {comment} */")?;
        }
        if let Some(partner) = env.class_match(class).filter(|&partner| partner != class) {
            writeln!(out, "// matched to {}", type_name(env, partner, names))?;
        }
        let keyword = if instance.is_annotation() {
            "@interface"
        } else if instance.is_interface() {
            "interface"
        } else if instance.is_enum() {
            "enum"
        } else if instance.is_record() {
            "record"
        } else {
            "class"
        };
        let mut class_flags = instance.access;
        if instance.is_interface() {
            class_flags &= !access::ABSTRACT;
        }
        write!(
            out,
            "{}{keyword} {}",
            modifiers(class_flags),
            type_name(env, class, names)
        )?;
        if let Some(super_class) = instance.super_class
            && !instance.is_interface()
            && env.class(super_class).name != "java/lang/Object"
        {
            write!(out, " extends {}", type_name(env, super_class, names))?;
        }
        if !instance.interfaces.is_empty() {
            let joined: Vec<String> = instance
                .interfaces
                .iter()
                .map(|&interface| type_name(env, interface, names))
                .collect();
            let keyword = if instance.is_interface() { "extends" } else { "implements" };
            write!(out, " {keyword} {}", joined.join(", "))?;
        }
        writeln!(out, " {{")?;

        for &id in &instance.fields {
            let field = env.field(id);
            if !field.real {
                continue;
            }
            let name = member_name(env, id.into(), names);
            write!(
                out,
                "    {}{} {name}",
                modifiers(field.access),
                type_name(env, field.ty, names)
            )?;
            if let Some(value) = &field.initial_value {
                write!(out, " = {value}")?;
            }
            writeln!(out, ";")?;
        }
        if !instance.fields.is_empty() && !instance.methods.is_empty() {
            writeln!(out)?;
        }

        for &id in &instance.methods {
            let method = env.method(id);
            if !method.real || method.is_initializer() {
                continue;
            }
            if let Some(comment) = &method.mapped_comment {
                writeln!(out, "    /** {comment} */")?;
            }
            let args: Vec<String> = method
                .args
                .iter()
                .map(|&arg| {
                    let var = env.var(arg);
                    let name = env
                        .display_name(arg.into(), resolve_var_names(names))
                        .unwrap_or_else(|| var.plain_name());
                    format!("{} {name}", type_name(env, var.ty, names))
                })
                .collect();
            let head = if method.is_constructor() {
                type_name(env, class, names)
                    .rsplit('.')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            } else {
                format!(
                    "{} {}",
                    type_name(env, method.ret_type, names),
                    member_name(env, id.into(), names)
                )
            };
            let terminator = if method.is_abstract() || method.access & access::NATIVE != 0 {
                ";"
            } else {
                " { ... }"
            };
            writeln!(
                out,
                "    {}{head}({}){terminator}",
                modifiers(method.access & !access::VARARGS),
                args.join(", ")
            )?;
        }
        writeln!(out, "}}")?;
        Ok(out)
    }
}

fn resolve_var_names(names: NameType) -> NameType {
    match names {
        NameType::Tmp | NameType::MappedTmpPlain => NameType::MappedPlain,
        other => other,
    }
}

fn member_name(env: &ClassEnvironment, entity: EntityRef, names: NameType) -> String {
    env.display_name(entity, names)
        .or_else(|| env.display_name(entity, NameType::Plain))
        .unwrap_or_default()
}

/// Java spelling of a type under the given naming mode.
fn type_name(env: &ClassEnvironment, id: ClassId, names: NameType) -> String {
    let class = env.class(id);
    match class.origin {
        ClassOrigin::Primitive => java_type_name(&class.id),
        ClassOrigin::Array => match class.element_class {
            Some(element) => {
                format!("{}{}", type_name(env, element, names), "[]".repeat(class.dims))
            }
            None => java_type_name(&class.id),
        },
        _ => env
            .display_name(id.into(), names)
            .unwrap_or_else(|| class.name.clone())
            .replace('/', "."),
    }
}

fn modifiers(flags: u16) -> String {
    let mut out = String::new();
    for (flag, word) in [
        (access::PUBLIC, "public "),
        (access::PRIVATE, "private "),
        (access::PROTECTED, "protected "),
        (access::STATIC, "static "),
        (access::FINAL, "final "),
        (access::ABSTRACT, "abstract "),
        (access::NATIVE, "native "),
    ] {
        if flags & flag != 0 {
            out.push_str(word);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::testing::*;
    use crate::model::Side;

    #[test]
    fn skeleton_lists_declarations_with_mapped_names() {
        let mut main = class("a", Some("java/lang/Object"));
        main.methods.push(method("b", "(I)Ljava/lang/String;", Vec::new()));
        main.fields.push(field("c", "[I"));
        let mut env = build_env(vec![main], Vec::new());
        let cls = class_id(&env, Side::A, "a");
        env.set_mapped_name(cls.into(), Some("app/Main".to_string()));
        let b = method_id(&env, Side::A, "a", "b", "(I)Ljava/lang/String;");
        env.set_mapped_name(b.into(), Some("describe".to_string()));

        let text = SkeletonRenderer
            .render(&env, cls, NameType::MappedPlain)
            .expect("render");

        assert!(text.contains("public class app.Main {"), "{text}");
        assert!(text.contains("private int[] c;"), "{text}");
        assert!(text.contains("public java.lang.String describe(int arg0) { ... }"), "{text}");
    }
}
