use std::collections::{BTreeSet, VecDeque};

use tracing::{debug, warn};

use super::inputs::{ClassIndex, EnvInputs};
use super::{ClassEnvironment, hierarchy, naming};
use crate::cfg::flow_shape;
use crate::classfile::{
    CallKind, Code, Constant, Handle, InstructionKind, RawClass, RawField, RawMethod, access,
};
use crate::descriptor::{MethodDescriptor, array_dims, class_name_to_descriptor, is_primitive};
use crate::model::{
    ClassId, ClassInstance, ClassOrigin, FieldId, FieldInstance, MethodId, MethodInstance,
    MethodVarInstance, NumberConstant, RecordLink, Side, VarId, member_key,
};
use crate::progress::{ProgressSink, ProgressTracker};

pub(super) fn build(mut inputs: EnvInputs, progress: &dyn ProgressSink) -> ClassEnvironment {
    let mut builder = Builder {
        env: ClassEnvironment::default(),
        classpath: [
            std::mem::take(&mut inputs.side_mut(Side::A).classpath),
            std::mem::take(&mut inputs.side_mut(Side::B).classpath),
        ],
        shared: std::mem::take(&mut inputs.shared),
        bodies: Vec::new(),
    };

    // Pass 0 leftovers: shells for every input class so forward references resolve to them.
    let mut pending = Vec::new();
    for side in Side::BOTH {
        let side_inputs = inputs.side_mut(side);
        builder.env.local[side.slot()].patterns = std::mem::take(&mut side_inputs.patterns);
        let mut classes = std::mem::take(&mut side_inputs.classes);
        classes.sort_by(|a, b| a.name.cmp(&b.name));
        for raw in classes {
            let id = builder.create_input_shell(side, &raw.name);
            pending.push((id, raw));
        }
    }

    // Each of the two passes reports half of the stage.
    let first_half = |fraction: f64| progress.progress(fraction * 0.5);
    let tracker = ProgressTracker::new(&first_half, pending.len());

    // Pass A: members, type links and intra-class structure.
    for (id, raw) in pending {
        builder.process_class(id, raw);
        tracker.item_done();
    }
    debug!(classes = builder.env.classes.len(), "intra-class pass done");

    // Pass B: call, field and type references from input method bodies.
    let bodies = std::mem::take(&mut builder.bodies);
    let second_half = |fraction: f64| progress.progress(0.5 + fraction * 0.5);
    let tracker = ProgressTracker::new(&second_half, bodies.len());
    for (method, code) in bodies {
        builder.process_body(method, &code);
        tracker.item_done();
    }
    builder.aggregate_class_refs();
    debug!(methods = builder.env.methods.len(), "cross-reference pass done");

    let mut env = builder.env;
    // Pass C and D.
    hierarchy::compute(&mut env);
    // Pass E.
    naming::assign_tmp_names(&mut env);
    env
}

struct Builder {
    env: ClassEnvironment,
    classpath: [ClassIndex; 2],
    shared: ClassIndex,
    bodies: Vec<(MethodId, Code)>,
}

impl Builder {
    fn create_input_shell(&mut self, side: Side, name: &str) -> ClassId {
        let desc = class_name_to_descriptor(name);
        let mut class = ClassInstance::new(
            desc.clone(),
            name.to_string(),
            Some(side),
            ClassOrigin::Input,
        );
        class.name_obfuscated = self.env.local[side.slot()].patterns.is_class_obfuscated(name);
        let id = self.push_class(class);
        let local = &mut self.env.local[side.slot()];
        local.classes.insert(desc, id);
        local.inputs.push(id);
        id
    }

    fn push_class(&mut self, class: ClassInstance) -> ClassId {
        let id = ClassId::from_index(self.env.classes.len());
        self.env.classes.push(class);
        id
    }

    fn class(&self, id: ClassId) -> &ClassInstance {
        &self.env.classes[id.index()]
    }

    fn class_mut(&mut self, id: ClassId) -> &mut ClassInstance {
        &mut self.env.classes[id.index()]
    }

    /// Resolve an internal class name (arrays in descriptor form) from one side's view.
    fn resolve_class(&mut self, side: Option<Side>, name: &str) -> ClassId {
        self.resolve_type(side, &class_name_to_descriptor(name))
    }

    /// Resolve a field descriptor to its class entity, materializing it if needed.
    ///
    /// Lookup order: side-local classes, the side's classpath, the shared pool,
    /// the shared classpath, and finally a shared placeholder.
    fn resolve_type(&mut self, side: Option<Side>, desc: &str) -> ClassId {
        if let Some(side) = side {
            if let Some(&id) = self.env.local[side.slot()].classes.get(desc) {
                return id;
            }
        }

        if desc.len() == 1 && is_primitive(desc) {
            if let Some(&id) = self.env.shared.get(desc) {
                return id;
            }
            let class = ClassInstance::new(
                desc.to_string(),
                desc.to_string(),
                None,
                ClassOrigin::Primitive,
            );
            let id = self.push_class(class);
            self.env.shared.insert(desc.to_string(), id);
            return id;
        }

        if desc.starts_with('[') {
            return self.create_array(side, desc);
        }

        let name = desc
            .strip_prefix('L')
            .and_then(|rest| rest.strip_suffix(';'))
            .unwrap_or(desc)
            .to_string();
        if let Some(side) = side {
            if self.classpath[side.slot()].contains(&name) {
                let raw = self.classpath[side.slot()].take(&name);
                return self.materialize(Some(side), desc, &name, raw);
            }
        }
        if let Some(&id) = self.env.shared.get(desc) {
            return id;
        }
        if self.shared.contains(&name) {
            let raw = self.shared.take(&name);
            return self.materialize(None, desc, &name, raw);
        }

        debug!(class = %name, "unresolved class, creating placeholder");
        let class = ClassInstance::new(desc.to_string(), name, None, ClassOrigin::Unknown);
        let id = self.push_class(class);
        self.env.shared.insert(desc.to_string(), id);
        id
    }

    fn materialize(
        &mut self,
        side: Option<Side>,
        desc: &str,
        name: &str,
        raw: Option<anyhow::Result<RawClass>>,
    ) -> ClassId {
        let (origin, raw) = match raw {
            Some(Ok(raw)) => (ClassOrigin::Classpath, Some(raw)),
            Some(Err(error)) => {
                warn!(class = %name, error = format!("{error:#}"), "failed to decode classpath class");
                (ClassOrigin::Unknown, None)
            }
            None => (ClassOrigin::Unknown, None),
        };
        let class = ClassInstance::new(desc.to_string(), name.to_string(), side, origin);
        let id = self.push_class(class);
        match side {
            Some(side) => {
                self.env.local[side.slot()].classes.insert(desc.to_string(), id);
            }
            None => {
                self.env.shared.insert(desc.to_string(), id);
            }
        }
        if let Some(raw) = raw {
            self.process_class(id, raw);
        }
        id
    }

    fn create_array(&mut self, side: Option<Side>, desc: &str) -> ClassId {
        let dims = array_dims(desc);
        let element = self.resolve_type(side, &desc[dims..]);
        let element_side = self.class(element).side;
        // A previous lookup may have created it while resolving the element.
        if let Some(id) = self.lookup(element_side, desc) {
            return id;
        }
        let mut class = ClassInstance::new(
            desc.to_string(),
            desc.to_string(),
            element_side,
            ClassOrigin::Array,
        );
        class.dims = dims;
        class.element_class = Some(element);
        class.name_obfuscated = self.class(element).name_obfuscated;
        class.access = access::PUBLIC | access::FINAL | access::ABSTRACT;
        let id = self.push_class(class);
        match element_side {
            Some(side) => {
                self.env.local[side.slot()].classes.insert(desc.to_string(), id);
            }
            None => {
                self.env.shared.insert(desc.to_string(), id);
            }
        }
        self.class_mut(element).array_classes.insert(id);
        id
    }

    fn lookup(&self, side: Option<Side>, desc: &str) -> Option<ClassId> {
        match side {
            Some(side) => self.env.local[side.slot()].classes.get(desc).copied(),
            None => self.env.shared.get(desc).copied(),
        }
    }

    fn member_obfuscated(&self, cls: ClassId, name: &str) -> bool {
        let class = self.class(cls);
        match class.side {
            Some(side) if class.is_input() => {
                self.env.local[side.slot()].patterns.is_member_obfuscated(name)
            }
            _ => false,
        }
    }

    fn process_class(&mut self, id: ClassId, raw: RawClass) {
        let side = self.class(id).side;
        {
            let class = self.class_mut(id);
            class.access = raw.access;
            class.signature = raw.signature.clone();
            class.source_file = raw.source_file.clone();
        }

        if let Some(super_name) = &raw.super_name {
            let super_class = self.resolve_class(side, super_name);
            self.class_mut(id).super_class = Some(super_class);
            self.class_mut(super_class).children.insert(id);
        }
        for interface in &raw.interfaces {
            let interface = self.resolve_class(side, interface);
            self.class_mut(id).interfaces.insert(interface);
            self.class_mut(interface).implementers.insert(id);
        }

        let is_input = self.class(id).is_input();
        for (position, field) in raw.fields.into_iter().enumerate() {
            self.create_field(id, position, field);
        }
        for (position, method) in raw.methods.into_iter().enumerate() {
            self.create_method(id, position, method, is_input);
        }

        for component in &raw.record_components {
            let class = self.class(id);
            let Some(field) = class.field(&component.name, &component.descriptor) else {
                continue;
            };
            let accessor = class.method(&component.name, &format!("(){}", component.descriptor));
            self.class_mut(id)
                .record_components
                .push(RecordLink { field, accessor });
        }

        if is_input {
            self.link_outer_class(id, raw.outer_name.as_deref());
        }
    }

    /// Outer class from the class file attributes, else from a `Outer$Inner` name.
    fn link_outer_class(&mut self, id: ClassId, declared: Option<&str>) {
        let Some(side) = self.class(id).side else {
            return;
        };
        let outer = match declared {
            Some(outer) => Some(self.resolve_class(Some(side), outer)),
            None => {
                let name = self.class(id).name.clone();
                name.rsplit_once('$')
                    .filter(|(prefix, _)| !prefix.is_empty())
                    .and_then(|(prefix, _)| {
                        self.env.local[side.slot()]
                            .classes
                            .get(&class_name_to_descriptor(prefix))
                            .copied()
                    })
                    .filter(|&outer| self.class(outer).is_input())
            }
        };
        if let Some(outer) = outer.filter(|&outer| outer != id) {
            self.class_mut(id).outer_class = Some(outer);
            self.class_mut(outer).inner_classes.insert(id);
        }
    }

    fn create_field(&mut self, cls: ClassId, position: usize, raw: RawField) -> FieldId {
        let side = self.class(cls).side;
        let ty = self.resolve_type(side, &raw.descriptor);
        let mut field = FieldInstance::new(cls, raw.name, raw.descriptor, ty);
        field.access = raw.access;
        field.position = position;
        field.signature = raw.signature;
        field.initial_value = raw.constant.as_ref().map(Constant::describe);
        field.name_obfuscated = self.member_obfuscated(cls, &field.name);
        let id = self.push_field(cls, field);
        if self.class(ty).origin() != ClassOrigin::Primitive {
            self.class_mut(ty).field_type_refs.insert(id);
        }
        id
    }

    fn push_field(&mut self, cls: ClassId, field: FieldInstance) -> FieldId {
        let id = FieldId::from_index(self.env.fields.len());
        let key = member_key(&field.name, &field.desc);
        self.env.fields.push(field);
        let class = self.class_mut(cls);
        class.fields.push(id);
        class.field_index.insert(key, id);
        id
    }

    fn push_method(&mut self, cls: ClassId, method: MethodInstance) -> MethodId {
        let id = MethodId::from_index(self.env.methods.len());
        let key = member_key(&method.name, &method.desc);
        self.env.methods.push(method);
        let class = self.class_mut(cls);
        class.methods.push(id);
        class.method_index.insert(key, id);
        id
    }

    fn create_method(
        &mut self,
        cls: ClassId,
        position: usize,
        raw: RawMethod,
        is_input: bool,
    ) -> Option<MethodId> {
        let side = self.class(cls).side;
        let descriptor = match MethodDescriptor::parse(&raw.descriptor) {
            Ok(descriptor) => descriptor,
            Err(error) => {
                warn!(
                    class = %self.class(cls).name,
                    method = %raw.name,
                    error = format!("{error:#}"),
                    "skipping method with malformed descriptor"
                );
                return None;
            }
        };
        let ret_type = self.resolve_type(side, &descriptor.ret);
        let mut method = MethodInstance::new(cls, raw.name, raw.descriptor, ret_type);
        method.access = raw.access;
        method.position = position;
        method.signature = raw.signature;
        method.name_obfuscated = self.member_obfuscated(cls, &method.name);
        if let Some(code) = raw.code.as_ref().filter(|_| is_input) {
            method.opcodes = code.instructions.iter().map(|insn| insn.opcode).collect();
            method.flow = flow_shape(code).unwrap_or_else(|error| {
                debug!(method = %method.name, error = format!("{error:#}"), "no flow shape");
                Default::default()
            });
        }
        let is_static = method.is_static();
        let id = self.push_method(cls, method);

        for desc in std::iter::once(&descriptor.ret).chain(&descriptor.args) {
            let ty = self.resolve_type(side, desc);
            if self.class(ty).origin() != ClassOrigin::Primitive {
                self.class_mut(ty).method_type_refs.insert(id);
            }
        }

        self.create_vars(id, &descriptor, is_static, raw.code.as_ref(), is_input);
        if let Some(code) = raw.code.filter(|_| is_input) {
            self.bodies.push((id, code));
        }
        Some(id)
    }

    fn create_vars(
        &mut self,
        method: MethodId,
        descriptor: &MethodDescriptor,
        is_static: bool,
        code: Option<&Code>,
        is_input: bool,
    ) {
        let cls = self.env.methods[method.index()].cls;
        let side = self.class(cls).side;
        let offsets: Vec<u32> = code
            .map(|code| code.instructions.iter().map(|insn| insn.offset).collect())
            .unwrap_or_default();
        let end = offsets.len() as u32;
        let local_vars = code.map(|code| code.local_vars.as_slice()).unwrap_or_default();

        let mut slot: u16 = if is_static { 0 } else { 1 };
        let mut args = Vec::with_capacity(descriptor.args.len());
        let mut used_rows = BTreeSet::new();
        if !is_static {
            // `this`
            used_rows.extend(
                local_vars
                    .iter()
                    .enumerate()
                    .filter(|(_, lv)| lv.index == 0 && lv.start_pc == 0)
                    .map(|(row, _)| row),
            );
        }
        for (index, desc) in descriptor.args.iter().enumerate() {
            let row = local_vars
                .iter()
                .position(|lv| lv.index == slot && lv.start_pc == 0);
            if let Some(row) = row {
                used_rows.insert(row);
            }
            let name = row.map(|row| local_vars[row].name.clone());
            let ty = self.resolve_type(side, desc);
            let var = MethodVarInstance {
                method,
                is_arg: true,
                index,
                lv_index: slot,
                lvt_index: row,
                ty,
                start_insn: 0,
                end_insn: end,
                name_obfuscated: is_input && self.var_obfuscated(cls, name.as_deref()),
                name,
                matchable: true,
                mapped_name: None,
                mapped_comment: None,
            };
            args.push(self.push_var(var));
            slot += crate::descriptor::slot_size(desc);
        }

        let mut rows: Vec<usize> = (0..local_vars.len())
            .filter(|row| !used_rows.contains(row))
            .collect();
        rows.sort_by_key(|&row| (local_vars[row].start_pc, local_vars[row].index));
        let mut vars = Vec::with_capacity(rows.len());
        for (index, row) in rows.into_iter().enumerate() {
            let lv = &local_vars[row];
            let ty = self.resolve_type(side, &lv.descriptor);
            let start = offsets.partition_point(|&offset| offset < lv.start_pc) as u32;
            let stop = offsets.partition_point(|&offset| offset < lv.start_pc + lv.length) as u32;
            let var = MethodVarInstance {
                method,
                is_arg: false,
                index,
                lv_index: lv.index,
                lvt_index: Some(row),
                ty,
                start_insn: start,
                end_insn: stop,
                name: Some(lv.name.clone()),
                name_obfuscated: is_input && self.var_obfuscated(cls, Some(&lv.name)),
                matchable: true,
                mapped_name: None,
                mapped_comment: None,
            };
            vars.push(self.push_var(var));
        }

        let method = &mut self.env.methods[method.index()];
        method.args = args;
        method.vars = vars;
    }

    fn var_obfuscated(&self, cls: ClassId, name: Option<&str>) -> bool {
        name.is_none_or(|name| self.member_obfuscated(cls, name))
    }

    fn push_var(&mut self, var: MethodVarInstance) -> VarId {
        let id = VarId::from_index(self.env.vars.len());
        self.env.vars.push(var);
        id
    }

    fn process_body(&mut self, method: MethodId, code: &Code) {
        let cls = self.env.methods[method.index()].cls;
        let side = self.class(cls).side;
        for insn in &code.instructions {
            match &insn.kind {
                InstructionKind::Invoke(call) => {
                    let owner = self.resolve_class(side, &call.owner);
                    let target = self.resolve_method_or_stub(
                        owner,
                        &call.name,
                        &call.descriptor,
                        call.kind == CallKind::Static,
                    );
                    self.link_call(method, target);
                }
                InstructionKind::InvokeDynamic(site) => {
                    self.link_handle(method, side, &site.bootstrap);
                    for handle in &site.handle_args {
                        self.link_handle(method, side, handle);
                    }
                }
                InstructionKind::Field(field_access) => {
                    let owner = self.resolve_class(side, &field_access.owner);
                    let field = self.resolve_field_or_stub(
                        owner,
                        &field_access.name,
                        &field_access.descriptor,
                        field_access.is_static,
                    );
                    self.link_field(method, field, field_access.is_write);
                }
                InstructionKind::Type { class, .. } => {
                    let target = self.resolve_class(side, class);
                    self.env.methods[method.index()].class_refs.insert(target);
                }
                InstructionKind::Constant(constant) => self.record_constant(method, side, constant),
                InstructionKind::Other => {}
            }
        }
    }

    fn record_constant(&mut self, method: MethodId, side: Option<Side>, constant: &Constant) {
        let number = match constant {
            Constant::Int(value) => Some(NumberConstant::Int(i64::from(*value))),
            Constant::Long(value) => Some(NumberConstant::Int(*value)),
            Constant::Float(value) => Some(NumberConstant::Float(f64::from(*value).to_bits())),
            Constant::Double(value) => Some(NumberConstant::Float(value.to_bits())),
            Constant::String(value) => {
                let cls = self.env.methods[method.index()].cls;
                self.env.methods[method.index()].strings.insert(value.clone());
                self.class_mut(cls).strings.insert(value.clone());
                None
            }
            Constant::Class(name) => {
                let target = self.resolve_class(side, name);
                self.env.methods[method.index()].class_refs.insert(target);
                None
            }
            Constant::Handle(handle) => {
                self.link_handle(method, side, handle);
                None
            }
            Constant::MethodType(_) | Constant::Dynamic => None,
        };
        if let Some(number) = number {
            self.env.methods[method.index()].numbers.insert(number);
        }
    }

    fn link_handle(&mut self, method: MethodId, side: Option<Side>, handle: &Handle) {
        let owner = self.resolve_class(side, &handle.owner);
        if handle.is_field() {
            // getfield, getstatic, putfield, putstatic
            let is_static = handle.kind == 2 || handle.kind == 4;
            let field = self.resolve_field_or_stub(owner, &handle.name, &handle.descriptor, is_static);
            self.link_field(method, field, handle.kind >= 3);
        } else {
            let is_static = handle.kind == 6;
            let target =
                self.resolve_method_or_stub(owner, &handle.name, &handle.descriptor, is_static);
            self.link_call(method, target);
        }
    }

    fn link_call(&mut self, caller: MethodId, callee: MethodId) {
        self.env.methods[caller.index()].refs_out.insert(callee);
        self.env.methods[callee.index()].refs_in.insert(caller);
    }

    fn link_field(&mut self, method: MethodId, field: FieldId, is_write: bool) {
        if is_write {
            self.env.methods[method.index()].field_writes.insert(field);
            self.env.fields[field.index()].writers.insert(method);
        } else {
            self.env.methods[method.index()].field_reads.insert(field);
            self.env.fields[field.index()].readers.insert(method);
        }
    }

    /// Look the method up in the class, its super classes, then its interfaces.
    fn resolve_method(&self, owner: ClassId, name: &str, desc: &str) -> Option<MethodId> {
        let mut current = Some(owner);
        while let Some(cls) = current {
            if let Some(method) = self.class(cls).method(name, desc) {
                return Some(method);
            }
            current = self.class(cls).super_class;
        }

        let mut queue: VecDeque<ClassId> = VecDeque::new();
        let mut seen = BTreeSet::new();
        let mut current = Some(owner);
        while let Some(cls) = current {
            queue.extend(self.class(cls).interfaces.iter().copied());
            current = self.class(cls).super_class;
        }
        while let Some(interface) = queue.pop_front() {
            if !seen.insert(interface) {
                continue;
            }
            if let Some(method) = self.class(interface).method(name, desc) {
                return Some(method);
            }
            queue.extend(self.class(interface).interfaces.iter().copied());
        }
        None
    }

    fn resolve_method_or_stub(
        &mut self,
        owner: ClassId,
        name: &str,
        desc: &str,
        is_static: bool,
    ) -> MethodId {
        if let Some(method) = self.resolve_method(owner, name, desc) {
            return method;
        }
        let side = self.class(owner).side;
        let ret = MethodDescriptor::parse(desc)
            .map(|parsed| parsed.ret)
            .unwrap_or_else(|_| "V".to_string());
        let ret_type = self.resolve_type(side, &ret);
        let mut method = MethodInstance::new(owner, name.to_string(), desc.to_string(), ret_type);
        method.real = false;
        method.access = if is_static { access::PUBLIC | access::STATIC } else { access::PUBLIC };
        method.position = self.class(owner).methods.len();
        method.name_obfuscated = self.member_obfuscated(owner, name);
        debug!(class = %self.class(owner).name, method = name, "synthesized method stub");
        self.push_method(owner, method)
    }

    fn resolve_field(&self, owner: ClassId, name: &str, desc: &str) -> Option<FieldId> {
        let mut queue = VecDeque::from([owner]);
        let mut seen = BTreeSet::new();
        while let Some(cls) = queue.pop_front() {
            if !seen.insert(cls) {
                continue;
            }
            let class = self.class(cls);
            if let Some(field) = class.field(name, desc) {
                return Some(field);
            }
            queue.extend(class.interfaces.iter().copied());
            queue.extend(class.super_class);
        }
        None
    }

    fn resolve_field_or_stub(
        &mut self,
        owner: ClassId,
        name: &str,
        desc: &str,
        is_static: bool,
    ) -> FieldId {
        if let Some(field) = self.resolve_field(owner, name, desc) {
            return field;
        }
        let side = self.class(owner).side;
        let ty = self.resolve_type(side, desc);
        let mut field = FieldInstance::new(owner, name.to_string(), desc.to_string(), ty);
        field.real = false;
        field.access = if is_static { access::PUBLIC | access::STATIC } else { access::PUBLIC };
        field.position = self.class(owner).fields.len();
        field.name_obfuscated = self.member_obfuscated(owner, name);
        self.push_field(owner, field)
    }

    /// Lift method level references to class level `refs_in`/`refs_out`.
    fn aggregate_class_refs(&mut self) {
        for index in 0..self.env.methods.len() {
            let method = &self.env.methods[index];
            let cls = method.cls;
            if !self.env.classes[cls.index()].is_input() {
                continue;
            }
            let mut targets: BTreeSet<ClassId> = method
                .refs_out
                .iter()
                .map(|&callee| self.env.methods[callee.index()].cls)
                .collect();
            targets.extend(
                method
                    .field_reads
                    .iter()
                    .chain(&method.field_writes)
                    .map(|&field| self.env.fields[field.index()].cls),
            );
            targets.extend(method.class_refs.iter().copied());
            targets.remove(&cls);
            for target in targets {
                self.env.classes[cls.index()].refs_out.insert(target);
                self.env.classes[target.index()].refs_in.insert(cls);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::classfile::LocalVar;
    use crate::env::testing::*;
    use crate::model::{ClassOrigin, EntityRef, Side};

    #[test]
    fn record_components_link_fields_to_accessors() {
        let mut point = record("p", &[("a", "I"), ("b", "J")]);
        point.methods.retain(|method| method.name != "b");
        point.record_components.push(crate::classfile::RecordComponent {
            name: "c".to_string(),
            descriptor: "I".to_string(),
        });
        let plain = class("q", Some("java/lang/Object"));

        let env = build_env(vec![point, plain], Vec::new());

        let p = class_id(&env, Side::A, "p");
        let links = env.class(p).record_components();
        assert_eq!(2, links.len());
        assert!(env.class(p).is_record());
        assert_eq!(field_id(&env, Side::A, "p", "a", "I"), links[0].field);
        assert_eq!(Some(method_id(&env, Side::A, "p", "a", "()I")), links[0].accessor);
        assert_eq!(field_id(&env, Side::A, "p", "b", "J"), links[1].field);
        assert_eq!(None, links[1].accessor);
        assert!(!env.class(class_id(&env, Side::A, "q")).is_record());
    }

    #[test]
    fn input_classes_resolve_super_classes_and_members() {
        let mut base = class("a", Some("java/lang/Object"));
        base.fields.push(field("b", "I"));
        base.methods.push(method("c", "(Ljava/lang/String;)I", Vec::new()));
        let child = class("d", Some("a"));

        let env = build_env(vec![base, child], Vec::new());

        let a = class_id(&env, Side::A, "a");
        let d = class_id(&env, Side::A, "d");
        assert_eq!(Some(a), env.class(d).super_class());
        assert!(env.class(a).children().contains(&d));
        assert_eq!(ClassOrigin::Input, env.class(a).origin());
        let object = env.get_class(Side::A, "java/lang/Object").expect("object");
        assert!(env.class(object).is_shared());
        assert_eq!(ClassOrigin::Classpath, env.class(object).origin());

        let method = method_id(&env, Side::A, "a", "c", "(Ljava/lang/String;)I");
        assert_eq!(1, env.method(method).args().len());
        let string = env.get_class(Side::A, "java/lang/String").expect("string");
        assert!(env.class(string).method_type_refs().contains(&method));
        assert_eq!(Some(EntityRef::Class(object)), env.match_of(EntityRef::Class(object)));
    }

    #[test]
    fn missing_classes_become_shared_placeholders() {
        let env = build_env(vec![class("a", Some("missing/Base"))], Vec::new());

        let missing = env.get_class(Side::B, "missing/Base").expect("placeholder");
        assert_eq!(ClassOrigin::Unknown, env.class(missing).origin());
        assert!(env.class(missing).is_shared());
    }

    #[test]
    fn calls_fields_and_strings_are_cross_referenced() {
        let mut callee = class("b", Some("java/lang/Object"));
        callee.methods.push(method("x", "()V", Vec::new()));
        callee.fields.push(field("y", "I"));
        let mut caller = class("a", Some("java/lang/Object"));
        caller.methods.push(method(
            "run",
            "()V",
            vec![
                invoke("b", "x", "()V"),
                read("b", "y", "I"),
                write("b", "y", "I"),
                crate::classfile::InstructionKind::Constant(crate::classfile::Constant::String(
                    "hello".to_string(),
                )),
            ],
        ));

        let env = build_env(vec![caller, callee], Vec::new());

        let run = method_id(&env, Side::A, "a", "run", "()V");
        let x = method_id(&env, Side::A, "b", "x", "()V");
        let y = field_id(&env, Side::A, "b", "y", "I");
        assert!(env.method(run).refs_out().contains(&x));
        assert!(env.method(x).refs_in().contains(&run));
        assert!(env.field(y).readers().contains(&run));
        assert!(env.field(y).writers().contains(&run));
        assert!(env.method(run).strings().contains("hello"));
        let a = class_id(&env, Side::A, "a");
        let b = class_id(&env, Side::A, "b");
        assert!(env.class(a).refs_out().contains(&b));
        assert!(env.class(b).refs_in().contains(&a));
        assert!(env.class(a).strings().contains("hello"));
    }

    #[test]
    fn inherited_calls_resolve_and_unknown_targets_get_stubs() {
        let mut base = class("a", Some("java/lang/Object"));
        base.methods.push(method("m", "()V", Vec::new()));
        let child = class("b", Some("a"));
        let mut caller = class("c", Some("java/lang/Object"));
        caller.methods.push(method(
            "run",
            "()V",
            vec![invoke("b", "m", "()V"), invoke("b", "gone", "()I")],
        ));

        let env = build_env(vec![base, child, caller], Vec::new());

        let run = method_id(&env, Side::A, "c", "run", "()V");
        let m = method_id(&env, Side::A, "a", "m", "()V");
        let stub = method_id(&env, Side::A, "b", "gone", "()I");
        assert!(env.method(run).refs_out().contains(&m));
        assert!(env.method(run).refs_out().contains(&stub));
        assert!(!env.method(stub).is_real());
    }

    #[test]
    fn arrays_follow_their_element_class() {
        let mut holder = class("a", Some("java/lang/Object"));
        holder.fields.push(field("b", "[[La;"));
        holder.fields.push(field("c", "[I"));

        let env = build_env(vec![holder], Vec::new());

        let a = class_id(&env, Side::A, "a");
        let array = class_id(&env, Side::A, "[[La;");
        assert_eq!(Some(a), env.class(array).element_class());
        assert_eq!(2, env.class(array).dims());
        assert!(env.class(a).array_classes().contains(&array));
        assert_eq!(Some(Side::A), env.class(array).side());
        let ints = env.get_class(Side::A, "[I").expect("int array");
        assert!(env.class(ints).is_shared());
    }

    #[test]
    fn args_and_locals_come_from_the_local_variable_table() {
        let mut holder = class("a", Some("java/lang/Object"));
        let mut body = method("m", "(JI)V", vec![crate::classfile::InstructionKind::Other; 3]);
        if let Some(code) = body.code.as_mut() {
            for (name, descriptor, index, start_pc) in
                [("this", "La;", 0, 0), ("first", "J", 1, 0), ("second", "I", 3, 0), ("tmp", "I", 4, 1)]
            {
                code.local_vars.push(LocalVar {
                    start_pc,
                    length: 2,
                    name: name.to_string(),
                    descriptor: descriptor.to_string(),
                    index,
                });
            }
        }
        holder.methods.push(body);

        let env = build_env(vec![holder], Vec::new());

        let m = env.method(method_id(&env, Side::A, "a", "m", "(JI)V"));
        let args: Vec<_> = m.args().iter().map(|&arg| env.var(arg)).collect();
        assert_eq!(Some("first"), args[0].name());
        assert_eq!(3, args[1].lv_index());
        assert_eq!(Some("second"), args[1].name());
        assert_eq!(1, m.vars().len());
        let local = env.var(m.vars()[0]);
        assert_eq!(Some("tmp"), local.name());
        assert_eq!(1, local.start_insn());
        assert_eq!(3, local.end_insn());
    }

    #[test]
    fn inner_classes_link_through_the_dollar_fallback() {
        let env = build_env(
            vec![
                class("a", Some("java/lang/Object")),
                class("a$1", Some("java/lang/Object")),
            ],
            Vec::new(),
        );

        let outer = class_id(&env, Side::A, "a");
        let inner = class_id(&env, Side::A, "a$1");
        assert_eq!(Some(outer), env.class(inner).outer_class());
        assert!(env.class(outer).inner_classes().contains(&inner));
    }
}
