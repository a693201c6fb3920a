use super::ClassEnvironment;
use crate::model::{ClassId, ClassOrigin, NameType, Side};

impl ClassEnvironment {
    /// Class name under `names`.
    ///
    /// Arrays keep descriptor form around their element's resolved name.
    /// Inner classes with a simple resolved name, or none at all, are
    /// qualified by their outer class's resolved name.
    pub(super) fn class_display_name(&self, id: ClassId, names: NameType) -> Option<String> {
        let class = self.class(id);
        match class.origin {
            ClassOrigin::Primitive => return Some(class.name.clone()),
            ClassOrigin::Array => {
                let element = class.element_class?;
                let resolved = self.class_display_name(element, names)?;
                let element_desc = if self.class(element).origin == ClassOrigin::Primitive {
                    resolved
                } else {
                    format!("L{resolved};")
                };
                return Some(format!("{}{element_desc}", "[".repeat(class.dims)));
            }
            _ => {}
        }

        let own = match names {
            NameType::Plain => return Some(class.name.clone()),
            NameType::Mapped | NameType::MappedPlain => class.mapped_name.as_deref(),
            NameType::Tmp => class.tmp_name.as_deref(),
            NameType::MappedTmpPlain => class.mapped_name.as_deref().or(class.tmp_name.as_deref()),
        };
        let outer = class.outer_class.filter(|&outer| outer != id);
        match (own, outer) {
            (Some(own), Some(outer)) if !own.contains(['/', '$']) => {
                let prefix = self.class_display_name(outer, names)?;
                Some(format!("{prefix}${own}"))
            }
            (Some(own), _) => Some(own.to_string()),
            (None, Some(outer)) => {
                let suffix = class.name.rsplit_once('$').map(|(_, suffix)| suffix)?;
                let prefix = self.class_display_name(outer, names)?;
                if prefix == self.class(outer).name {
                    return fallback(class.name.as_str(), names);
                }
                Some(format!("{prefix}${suffix}"))
            }
            (None, None) => fallback(class.name.as_str(), names),
        }
    }
}

fn fallback(plain: &str, names: NameType) -> Option<String> {
    match names {
        NameType::MappedPlain | NameType::MappedTmpPlain | NameType::Plain => {
            Some(plain.to_string())
        }
        NameType::Mapped | NameType::Tmp => None,
    }
}

/// Assign `c`, `m`, `vm` and `f` prefixed names, numbered per side in input order.
pub(super) fn assign_tmp_names(env: &mut ClassEnvironment) {
    for side in Side::BOTH {
        let tag = side.tag();
        let (mut classes, mut methods, mut hierarchies, mut fields) = (0, 0, 0, 0);
        let inputs = env.local[side.slot()].inputs.clone();

        for &cls in &inputs {
            let class = &mut env.classes[cls.index()];
            if class.name_obfuscated {
                classes += 1;
                class.tmp_name = Some(format!("c{tag}{classes}"));
            }
        }

        for &cls in &inputs {
            for method in env.classes[cls.index()].methods.clone() {
                let instance = &env.methods[method.index()];
                if !instance.name_obfuscated || instance.tmp_name.is_some() {
                    continue;
                }
                let members = &env.hierarchies[instance.hierarchy];
                if members.len() < 2 {
                    methods += 1;
                    env.methods[method.index()].tmp_name = Some(format!("m{tag}{methods}"));
                    continue;
                }
                hierarchies += 1;
                let name = format!("vm{tag}{hierarchies}");
                for member in members.clone() {
                    env.methods[member.index()].tmp_name = Some(name.clone());
                }
            }

            for field in env.classes[cls.index()].fields.clone() {
                let instance = &mut env.fields[field.index()];
                if instance.name_obfuscated {
                    fields += 1;
                    instance.tmp_name = Some(format!("f{tag}{fields}"));
                }
            }
        }
    }
}
