use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{MappingAcceptor, MappingSource, MemberKey, VarKey};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonMappings {
    /// Keyed by internal class name.
    pub classes: BTreeMap<String, ClassMapping>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassMapping {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<MethodMapping>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldMapping>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodMapping {
    pub name: String,
    pub desc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<VarMapping>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vars: Vec<VarMapping>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VarMapping {
    pub index: usize,
    pub lv_index: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    pub name: String,
    pub desc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl JsonMappings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("failed to serialize mappings")?;
        fs::write(path, text + "\n").with_context(|| format!("failed to write {}", path.display()))
    }

    fn method_entry(&mut self, key: MemberKey<'_>) -> &mut MethodMapping {
        let methods = &mut self.classes.entry(key.owner.to_string()).or_default().methods;
        let position = match methods
            .iter()
            .position(|method| method.name == key.name && method.desc == key.desc)
        {
            Some(position) => position,
            None => {
                methods.push(MethodMapping {
                    name: key.name.to_string(),
                    desc: key.desc.to_string(),
                    ..MethodMapping::default()
                });
                methods.len() - 1
            }
        };
        &mut methods[position]
    }

    fn field_entry(&mut self, key: MemberKey<'_>) -> &mut FieldMapping {
        let fields = &mut self.classes.entry(key.owner.to_string()).or_default().fields;
        let position = match fields
            .iter()
            .position(|field| field.name == key.name && field.desc == key.desc)
        {
            Some(position) => position,
            None => {
                fields.push(FieldMapping {
                    name: key.name.to_string(),
                    desc: key.desc.to_string(),
                    ..FieldMapping::default()
                });
                fields.len() - 1
            }
        };
        &mut fields[position]
    }
}

fn var_entry<'a>(vars: &'a mut Vec<VarMapping>, key: VarKey<'_>) -> &'a mut VarMapping {
    let position = match vars
        .iter()
        .position(|var| var.index == key.index && var.lv_index == key.lv_index)
    {
        Some(position) => position,
        None => {
            vars.push(VarMapping {
                index: key.index,
                lv_index: key.lv_index,
                ..VarMapping::default()
            });
            vars.len() - 1
        }
    };
    &mut vars[position]
}

impl MappingAcceptor for JsonMappings {
    fn accept_class(&mut self, name: &str, mapped: &str) -> Result<()> {
        self.classes.entry(name.to_string()).or_default().mapped = Some(mapped.to_string());
        Ok(())
    }

    fn accept_class_comment(&mut self, name: &str, comment: &str) -> Result<()> {
        self.classes.entry(name.to_string()).or_default().comment = Some(comment.to_string());
        Ok(())
    }

    fn accept_method(&mut self, method: MemberKey<'_>, mapped: &str) -> Result<()> {
        self.method_entry(method).mapped = Some(mapped.to_string());
        Ok(())
    }

    fn accept_method_comment(&mut self, method: MemberKey<'_>, comment: &str) -> Result<()> {
        self.method_entry(method).comment = Some(comment.to_string());
        Ok(())
    }

    fn accept_method_arg(&mut self, arg: VarKey<'_>, mapped: &str) -> Result<()> {
        var_entry(&mut self.method_entry(arg.method).args, arg).mapped = Some(mapped.to_string());
        Ok(())
    }

    fn accept_method_arg_comment(&mut self, arg: VarKey<'_>, comment: &str) -> Result<()> {
        var_entry(&mut self.method_entry(arg.method).args, arg).comment = Some(comment.to_string());
        Ok(())
    }

    fn accept_method_var(&mut self, var: VarKey<'_>, mapped: &str) -> Result<()> {
        var_entry(&mut self.method_entry(var.method).vars, var).mapped = Some(mapped.to_string());
        Ok(())
    }

    fn accept_field(&mut self, field: MemberKey<'_>, mapped: &str) -> Result<()> {
        self.field_entry(field).mapped = Some(mapped.to_string());
        Ok(())
    }

    fn accept_field_comment(&mut self, field: MemberKey<'_>, comment: &str) -> Result<()> {
        self.field_entry(field).comment = Some(comment.to_string());
        Ok(())
    }
}

impl MappingSource for JsonMappings {
    fn visit(&self, acceptor: &mut dyn MappingAcceptor) -> Result<()> {
        for (owner, class) in &self.classes {
            if let Some(mapped) = &class.mapped {
                acceptor.accept_class(owner, mapped)?;
            }
            if let Some(comment) = &class.comment {
                acceptor.accept_class_comment(owner, comment)?;
            }
            for method in &class.methods {
                let key = MemberKey {
                    owner,
                    name: &method.name,
                    desc: &method.desc,
                };
                if let Some(mapped) = &method.mapped {
                    acceptor.accept_method(key, mapped)?;
                }
                if let Some(comment) = &method.comment {
                    acceptor.accept_method_comment(key, comment)?;
                }
                for arg in &method.args {
                    let arg_key = VarKey {
                        method: key,
                        index: arg.index,
                        lv_index: arg.lv_index,
                    };
                    if let Some(mapped) = &arg.mapped {
                        acceptor.accept_method_arg(arg_key, mapped)?;
                    }
                    if let Some(comment) = &arg.comment {
                        acceptor.accept_method_arg_comment(arg_key, comment)?;
                    }
                }
                for var in &method.vars {
                    if let Some(mapped) = &var.mapped {
                        let var_key = VarKey {
                            method: key,
                            index: var.index,
                            lv_index: var.lv_index,
                        };
                        acceptor.accept_method_var(var_key, mapped)?;
                    }
                }
            }
            for field in &class.fields {
                let key = MemberKey {
                    owner,
                    name: &field.name,
                    desc: &field.desc,
                };
                if let Some(mapped) = &field.mapped {
                    acceptor.accept_field(key, mapped)?;
                }
                if let Some(comment) = &field.comment {
                    acceptor.accept_field_comment(key, comment)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_survives_a_file_round_trip_and_replays_in_order() {
        let mut mappings = JsonMappings::default();
        let key = MemberKey {
            owner: "a",
            name: "b",
            desc: "()V",
        };
        mappings.accept_class("a", "Main").expect("class");
        mappings.accept_method(key, "run").expect("method");
        mappings.accept_method_comment(key, "entry point").expect("comment");
        mappings
            .accept_method_arg(VarKey { method: key, index: 0, lv_index: 1 }, "args")
            .expect("arg");

        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("names.json");
        mappings.save(&path).expect("save");
        let loaded = JsonMappings::load(&path).expect("load");
        assert_eq!(mappings, loaded);

        let mut replayed = JsonMappings::default();
        loaded.visit(&mut replayed).expect("visit");
        assert_eq!(mappings, replayed);
        assert_eq!(1, replayed.classes["a"].methods.len());
    }

    #[test]
    fn name_and_comment_for_one_arg_share_an_entry() {
        let mut mappings = JsonMappings::default();
        let key = MemberKey {
            owner: "a",
            name: "b",
            desc: "(II)V",
        };
        let first = VarKey { method: key, index: 0, lv_index: 1 };
        let second = VarKey { method: key, index: 1, lv_index: 2 };
        mappings.accept_method_arg(first, "x").expect("arg");
        mappings.accept_method_arg_comment(first, "x coordinate").expect("comment");
        mappings.accept_method_arg(second, "y").expect("arg");
        mappings.accept_method_var(VarKey { method: key, index: 0, lv_index: 3 }, "sum").expect("var");

        let method = &mappings.classes["a"].methods[0];
        assert_eq!(2, method.args.len());
        assert_eq!(Some("x".to_string()), method.args[0].mapped);
        assert_eq!(Some("x coordinate".to_string()), method.args[0].comment);
        assert_eq!(Some("y".to_string()), method.args[1].mapped);
        assert_eq!(1, method.vars.len());
        assert_eq!(3, method.vars[0].lv_index);
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let mappings: JsonMappings =
            serde_json::from_str(r#"{"classes": {"a": {"mapped": "Main"}}}"#).expect("parse");
        assert_eq!(Some("Main".to_string()), mappings.classes["a"].mapped);
        assert!(mappings.classes["a"].methods.is_empty());
    }
}
