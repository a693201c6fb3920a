use std::collections::HashMap;

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
enum Entry {
    Utf8(String),
    Int(i32),
    Class(u16),
    String(u16),
    NameAndType(u16, u16),
    Member(u8, u16, u16),
}

struct Member {
    access: u16,
    name: u16,
    descriptor: u16,
    code: Option<Vec<u8>>,
    local_vars: Vec<(u16, u16, u16, u16, u16)>,
}

pub(crate) struct ClassAssembler {
    entries: Vec<Entry>,
    lookup: HashMap<Entry, u16>,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<Member>,
    methods: Vec<Member>,
}

impl ClassAssembler {
    pub(crate) fn new(name: &str, super_name: Option<&str>) -> Self {
        let mut asm = Self {
            entries: Vec::new(),
            lookup: HashMap::new(),
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        };
        asm.this_class = asm.class(name);
        asm.super_class = super_name.map(|s| asm.class(s)).unwrap_or(0);
        asm
    }

    fn intern(&mut self, entry: Entry) -> u16 {
        if let Some(index) = self.lookup.get(&entry) {
            return *index;
        }
        self.entries.push(entry.clone());
        let index = self.entries.len() as u16;
        self.lookup.insert(entry, index);
        index
    }

    pub(crate) fn utf8(&mut self, value: &str) -> u16 {
        self.intern(Entry::Utf8(value.to_string()))
    }

    pub(crate) fn class(&mut self, name: &str) -> u16 {
        let utf8 = self.utf8(name);
        self.intern(Entry::Class(utf8))
    }

    pub(crate) fn string(&mut self, value: &str) -> u16 {
        let utf8 = self.utf8(value);
        self.intern(Entry::String(utf8))
    }

    pub(crate) fn int(&mut self, value: i32) -> u16 {
        self.intern(Entry::Int(value))
    }

    fn member(&mut self, tag: u8, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class(owner);
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        let nat = self.intern(Entry::NameAndType(name, descriptor));
        self.intern(Entry::Member(tag, class, nat))
    }

    pub(crate) fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member(9, owner, name, descriptor)
    }

    pub(crate) fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member(10, owner, name, descriptor)
    }

    pub(crate) fn interface_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member(11, owner, name, descriptor)
    }

    pub(crate) fn add_interface(&mut self, name: &str) {
        let index = self.class(name);
        self.interfaces.push(index);
    }

    pub(crate) fn add_field(&mut self, access: u16, name: &str, descriptor: &str) {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.fields.push(Member {
            access,
            name,
            descriptor,
            code: None,
            local_vars: Vec::new(),
        });
    }

    pub(crate) fn add_method(
        &mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        code: Option<Vec<u8>>,
    ) -> usize {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.methods.push(Member {
            access,
            name,
            descriptor,
            code,
            local_vars: Vec::new(),
        });
        self.methods.len() - 1
    }

    /// Attach a `LocalVariableTable` entry to a method added earlier.
    pub(crate) fn add_local_var(
        &mut self,
        method: usize,
        start_pc: u16,
        length: u16,
        name: &str,
        descriptor: &str,
        index: u16,
    ) {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.methods[method]
            .local_vars
            .push((start_pc, length, name, descriptor, index));
    }

    pub(crate) fn finish(mut self) -> Vec<u8> {
        let code_name = self.utf8("Code");
        let lvt_name = self.utf8("LocalVariableTable");

        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&61u16.to_be_bytes());
        out.extend_from_slice(&(self.entries.len() as u16 + 1).to_be_bytes());
        for entry in &self.entries {
            match entry {
                Entry::Utf8(value) => {
                    out.push(1);
                    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
                    out.extend_from_slice(value.as_bytes());
                }
                Entry::Int(value) => {
                    out.push(3);
                    out.extend_from_slice(&value.to_be_bytes());
                }
                Entry::Class(name) => {
                    out.push(7);
                    out.extend_from_slice(&name.to_be_bytes());
                }
                Entry::String(utf8) => {
                    out.push(8);
                    out.extend_from_slice(&utf8.to_be_bytes());
                }
                Entry::NameAndType(name, descriptor) => {
                    out.push(12);
                    out.extend_from_slice(&name.to_be_bytes());
                    out.extend_from_slice(&descriptor.to_be_bytes());
                }
                Entry::Member(tag, class, nat) => {
                    out.push(*tag);
                    out.extend_from_slice(&class.to_be_bytes());
                    out.extend_from_slice(&nat.to_be_bytes());
                }
            }
        }
        out.extend_from_slice(&0x0021u16.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for interface in &self.interfaces {
            out.extend_from_slice(&interface.to_be_bytes());
        }
        for members in [&self.fields, &self.methods] {
            out.extend_from_slice(&(members.len() as u16).to_be_bytes());
            for member in members {
                write_member(&mut out, member, code_name, lvt_name);
            }
        }
        out.extend_from_slice(&0u16.to_be_bytes());
        out
    }
}

fn write_member(out: &mut Vec<u8>, member: &Member, code_name: u16, lvt_name: u16) {
    out.extend_from_slice(&member.access.to_be_bytes());
    out.extend_from_slice(&member.name.to_be_bytes());
    out.extend_from_slice(&member.descriptor.to_be_bytes());
    let Some(code) = &member.code else {
        out.extend_from_slice(&0u16.to_be_bytes());
        return;
    };
    out.extend_from_slice(&1u16.to_be_bytes());

    let mut body = Vec::new();
    body.extend_from_slice(&8u16.to_be_bytes());
    body.extend_from_slice(&8u16.to_be_bytes());
    body.extend_from_slice(&(code.len() as u32).to_be_bytes());
    body.extend_from_slice(code);
    body.extend_from_slice(&0u16.to_be_bytes());
    if member.local_vars.is_empty() {
        body.extend_from_slice(&0u16.to_be_bytes());
    } else {
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&lvt_name.to_be_bytes());
        let length = 2 + 10 * member.local_vars.len() as u32;
        body.extend_from_slice(&length.to_be_bytes());
        body.extend_from_slice(&(member.local_vars.len() as u16).to_be_bytes());
        for (start, len, name, descriptor, index) in &member.local_vars {
            for value in [start, len, name, descriptor, index] {
                body.extend_from_slice(&value.to_be_bytes());
            }
        }
    }

    out.extend_from_slice(&code_name.to_be_bytes());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&body);
}
