use tracing::debug;

use super::ClassEnvironment;
use crate::error::MatchError;
use crate::model::{ClassId, EntityRef, FieldId, MethodId, Side, VarId};

impl ClassEnvironment {
    /// Pair two classes of opposite sides.
    ///
    /// Existing pairings of either class are dissolved first, together with
    /// their member matches. Array classes of both classes are paired when
    /// each dimension has a single unmatched candidate, and methods whose
    /// override hierarchy is already matched follow along.
    pub fn match_classes(&mut self, a: ClassId, b: ClassId) -> Result<(), MatchError> {
        let (a, b) = self.ordered(a, b)?;
        let (dims_a, dims_b) = (self.class(a).dims, self.class(b).dims);
        if dims_a != dims_b {
            return Err(MatchError::DimensionMismatch {
                a: self.class(a).name.clone(),
                dims_a,
                b: self.class(b).name.clone(),
                dims_b,
            });
        }
        if self.matches.classes.get(a) == Some(b) {
            return Ok(());
        }

        self.unmatch_class(a);
        self.unmatch_class(b);
        self.matches.classes.link(a, b);
        debug!(a = %self.class(a).name, b = %self.class(b).name, "matched classes");

        self.co_match_arrays(a, b);
        self.match_resolved_hierarchies(a, b);
        self.cache.clear();
        Ok(())
    }

    /// Pair two methods whose owners are matched to each other.
    pub fn match_methods(&mut self, a: MethodId, b: MethodId) -> Result<(), MatchError> {
        let (a, b) = self.ordered(a, b)?;
        let (owner_a, owner_b) = (self.method(a).cls, self.method(b).cls);
        if self.matches.classes.get(owner_a) != Some(owner_b) {
            return Err(MatchError::OwnerMismatch {
                a: self.label(a.into()),
                b: self.label(b.into()),
            });
        }
        if self.matches.methods.get(a) == Some(b) {
            return Ok(());
        }

        self.unlink_method(a);
        self.unlink_method(b);
        self.matches.methods.link(a, b);
        self.match_hierarchy_siblings(a, b);
        self.cache.clear();
        Ok(())
    }

    /// Pair two fields whose owners are matched to each other.
    pub fn match_fields(&mut self, a: FieldId, b: FieldId) -> Result<(), MatchError> {
        let (a, b) = self.ordered(a, b)?;
        let (owner_a, owner_b) = (self.field(a).cls, self.field(b).cls);
        if self.matches.classes.get(owner_a) != Some(owner_b) {
            return Err(MatchError::OwnerMismatch {
                a: self.label(a.into()),
                b: self.label(b.into()),
            });
        }
        if self.matches.fields.get(a) == Some(b) {
            return Ok(());
        }

        self.matches.fields.unlink(a);
        self.matches.fields.unlink(b);
        self.matches.fields.link(a, b);
        self.cache.clear();
        Ok(())
    }

    /// Pair two arguments, or two local variables, of matched methods.
    pub fn match_vars(&mut self, a: VarId, b: VarId) -> Result<(), MatchError> {
        let (a, b) = self.ordered(a, b)?;
        let (method_a, method_b) = (self.var(a).method, self.var(b).method);
        if self.matches.methods.get(method_a) != Some(method_b) {
            return Err(MatchError::OwnerMismatch {
                a: self.label(a.into()),
                b: self.label(b.into()),
            });
        }
        if self.var(a).is_arg != self.var(b).is_arg {
            return Err(MatchError::VarKindMismatch {
                a: self.label(a.into()),
                b: self.label(b.into()),
            });
        }
        if self.matches.vars.get(a) == Some(b) {
            return Ok(());
        }

        self.matches.vars.unlink(a);
        self.matches.vars.unlink(b);
        self.matches.vars.link(a, b);
        self.cache.clear();
        Ok(())
    }

    /// Dissolve the pairing of an entity and everything that depends on it.
    ///
    /// Classes take their members, member variables and array classes with
    /// them; methods take their variables and their override hierarchy.
    pub fn unmatch(&mut self, entity: EntityRef) {
        let changed = match entity {
            EntityRef::Class(id) => self.unmatch_class(id),
            EntityRef::Method(id) => {
                let changed = self.unlink_method(id);
                if changed {
                    for member in self.hierarchy_members(id).to_vec() {
                        self.unlink_method(member);
                    }
                }
                changed
            }
            EntityRef::Field(id) => self.matches.fields.unlink(id).is_some(),
            EntityRef::Var(id) => self.matches.vars.unlink(id).is_some(),
        };
        if changed {
            debug!(entity = %self.label(entity), "unmatched");
            self.cache.clear();
        }
    }

    /// Include or exclude an entity from matching; excluding it unmatches it.
    pub fn set_matchable(&mut self, entity: EntityRef, matchable: bool) {
        if !matchable {
            let changed = match entity {
                EntityRef::Class(id) => self.unmatch_class(id),
                EntityRef::Method(id) => self.unlink_method(id),
                EntityRef::Field(id) => self.matches.fields.unlink(id).is_some(),
                EntityRef::Var(id) => self.matches.vars.unlink(id).is_some(),
            };
            if changed {
                self.cache.clear();
            }
        }
        match entity {
            EntityRef::Class(id) => self.classes[id.index()].matchable = matchable,
            EntityRef::Method(id) => self.methods[id.index()].matchable = matchable,
            EntityRef::Field(id) => self.fields[id.index()].matchable = matchable,
            EntityRef::Var(id) => self.vars[id.index()].matchable = matchable,
        }
    }

    /// Drop every match of every kind.
    pub fn clear_matches(&mut self) {
        self.matches.clear();
        self.cache.clear();
    }

    /// Validate a pairing request and return it ordered as (side A, side B).
    fn ordered<I>(&self, a: I, b: I) -> Result<(I, I), MatchError>
    where
        I: Copy + Into<EntityRef>,
    {
        let (entity_a, entity_b) = (a.into(), b.into());
        let side_a = self
            .side_of(entity_a)
            .ok_or_else(|| MatchError::SharedEntity(self.label(entity_a)))?;
        let side_b = self
            .side_of(entity_b)
            .ok_or_else(|| MatchError::SharedEntity(self.label(entity_b)))?;
        if side_a == side_b {
            return Err(MatchError::SameSide {
                a: self.label(entity_a),
                b: self.label(entity_b),
            });
        }
        for entity in [entity_a, entity_b] {
            if !self.is_matchable(entity) {
                return Err(MatchError::NotMatchable(self.label(entity)));
            }
        }
        Ok(if side_a == Side::A { (a, b) } else { (b, a) })
    }

    fn unmatch_class(&mut self, id: ClassId) -> bool {
        if self.matches.classes.unlink(id).is_none() {
            return false;
        }
        let class = self.class(id);
        let (methods, fields) = (class.methods.clone(), class.fields.clone());
        let arrays: Vec<ClassId> = class.array_classes.iter().copied().collect();
        for method in methods {
            self.unlink_method(method);
        }
        for field in fields {
            self.matches.fields.unlink(field);
        }
        for array in arrays {
            self.unmatch_class(array);
        }
        true
    }

    /// Unpair one method and its variables.
    fn unlink_method(&mut self, id: MethodId) -> bool {
        if self.matches.methods.unlink(id).is_none() {
            return false;
        }
        let method = self.method(id);
        let vars: Vec<VarId> = method.args.iter().chain(&method.vars).copied().collect();
        for var in vars {
            self.matches.vars.unlink(var);
        }
        true
    }

    fn co_match_arrays(&mut self, a: ClassId, b: ClassId) {
        if let (Some(element_a), Some(element_b)) =
            (self.class(a).element_class, self.class(b).element_class)
        {
            let free = |id: ClassId| {
                let class = self.class(id);
                !class.is_shared() && class.matchable && self.matches.classes.get(id).is_none()
            };
            if free(element_a) && free(element_b) {
                if let Err(error) = self.match_classes(element_a, element_b) {
                    debug!(%error, "element classes left unmatched");
                }
            }
            return;
        }

        for array in self.class(a).array_classes.clone() {
            if self.matches.classes.get(array).is_some() || !self.class(array).matchable {
                continue;
            }
            let dims = self.class(array).dims;
            let candidates: Vec<ClassId> = self
                .class(b)
                .array_classes
                .iter()
                .copied()
                .filter(|&candidate| {
                    self.class(candidate).dims == dims
                        && self.class(candidate).matchable
                        && self.matches.classes.get(candidate).is_none()
                })
                .collect();
            if let [only] = candidates[..] {
                self.matches.classes.link(array, only);
            }
        }
    }

    /// Pair methods of `a` whose hierarchy already has a match into `b`.
    fn match_resolved_hierarchies(&mut self, a: ClassId, b: ClassId) {
        for method in self.class(a).methods.clone() {
            if self.matches.methods.get(method).is_some() || !self.method(method).matchable {
                continue;
            }
            let target = self
                .hierarchy_members(method)
                .iter()
                .filter(|&&sibling| sibling != method)
                .find_map(|&sibling| self.matches.methods.get(sibling));
            let Some(target) = target else {
                continue;
            };
            if let Some(only) = self.unique_unmatched_in_hierarchy(b, self.method(target).hierarchy) {
                self.matches.methods.link(method, only);
            }
        }
    }

    /// Extend a fresh method pairing to unmatched members of both hierarchies.
    fn match_hierarchy_siblings(&mut self, a: MethodId, b: MethodId) {
        let hierarchy_b = self.method(b).hierarchy;
        for sibling in self.hierarchy_members(a).to_vec() {
            if sibling == a
                || self.matches.methods.get(sibling).is_some()
                || !self.method(sibling).matchable
            {
                continue;
            }
            let Some(owner) = self.matches.classes.get(self.method(sibling).cls) else {
                continue;
            };
            if let Some(only) = self.unique_unmatched_in_hierarchy(owner, hierarchy_b) {
                self.matches.methods.link(sibling, only);
            }
        }
    }

    fn unique_unmatched_in_hierarchy(&self, cls: ClassId, hierarchy: usize) -> Option<MethodId> {
        let mut candidates = self.class(cls).methods.iter().copied().filter(|&candidate| {
            let method = self.method(candidate);
            method.hierarchy == hierarchy
                && method.matchable
                && self.matches.methods.get(candidate).is_none()
        });
        let first = candidates.next()?;
        candidates.next().is_none().then_some(first)
    }
}

#[cfg(test)]
mod tests {
    use crate::env::testing::*;
    use crate::error::MatchError;
    use crate::model::{EntityRef, Side};

    fn pair_env() -> crate::env::ClassEnvironment {
        let mut a = class("a", Some("java/lang/Object"));
        a.methods.push(method("m", "(I)V", Vec::new()));
        a.fields.push(field("f", "I"));
        a.fields.push(field("g", "[La;"));
        a.fields.push(field("h", "[[La;"));
        let mut b = class("b", Some("java/lang/Object"));
        b.methods.push(method("n", "(I)V", Vec::new()));
        b.fields.push(field("k", "I"));
        b.fields.push(field("l", "[Lb;"));
        b.fields.push(field("o", "[[Lb;"));
        build_env(vec![a], vec![b])
    }

    #[test]
    fn matching_is_symmetric_and_idempotent() {
        let mut env = pair_env();
        let a = class_id(&env, Side::A, "a");
        let b = class_id(&env, Side::B, "b");

        env.match_classes(b, a).expect("match");
        assert_eq!(Some(b), env.class_match(a));
        assert_eq!(Some(a), env.class_match(b));

        env.match_classes(a, b).expect("rematch");
        assert_eq!(Some(b), env.class_match(a));
    }

    #[test]
    fn element_match_pairs_array_classes_of_equal_dimension() {
        let mut env = pair_env();
        let a = class_id(&env, Side::A, "a");
        let b = class_id(&env, Side::B, "b");

        env.match_classes(a, b).expect("match");

        let a1 = class_id(&env, Side::A, "[La;");
        let a2 = class_id(&env, Side::A, "[[La;");
        let b1 = class_id(&env, Side::B, "[Lb;");
        let b2 = class_id(&env, Side::B, "[[Lb;");
        assert_eq!(Some(b1), env.class_match(a1));
        assert_eq!(Some(b2), env.class_match(a2));

        env.unmatch(EntityRef::Class(a));
        assert_eq!(None, env.class_match(a1));
        assert_eq!(None, env.class_match(b2));
    }

    #[test]
    fn array_match_pulls_in_the_element_classes() {
        let mut env = pair_env();
        let a1 = class_id(&env, Side::A, "[La;");
        let b1 = class_id(&env, Side::B, "[Lb;");

        env.match_classes(a1, b1).expect("match");

        let a = class_id(&env, Side::A, "a");
        let b = class_id(&env, Side::B, "b");
        assert_eq!(Some(b), env.class_match(a));
    }

    #[test]
    fn dimension_mismatch_is_rejected_without_changes() {
        let mut env = pair_env();
        let a = class_id(&env, Side::A, "a");
        let b1 = class_id(&env, Side::B, "[Lb;");

        let error = env.match_classes(a, b1).expect_err("shape differs");

        assert!(matches!(error, MatchError::DimensionMismatch { dims_a: 0, dims_b: 1, .. }));
        assert_eq!(None, env.class_match(a));
        assert_eq!(None, env.class_match(b1));
    }

    #[test]
    fn invalid_pairs_are_rejected() {
        let mut env = pair_env();
        let a = class_id(&env, Side::A, "a");
        let a1 = class_id(&env, Side::A, "[La;");
        let object = env.get_class(Side::A, "java/lang/Object").expect("object");

        assert!(matches!(env.match_classes(a, a1), Err(MatchError::SameSide { .. })));
        assert!(matches!(env.match_classes(a, object), Err(MatchError::SharedEntity(_))));

        let m = method_id(&env, Side::A, "a", "m", "(I)V");
        let n = method_id(&env, Side::B, "b", "n", "(I)V");
        assert!(matches!(env.match_methods(m, n), Err(MatchError::OwnerMismatch { .. })));
    }

    #[test]
    fn unmatching_a_class_clears_members_and_vars() {
        let mut env = pair_env();
        let a = class_id(&env, Side::A, "a");
        let b = class_id(&env, Side::B, "b");
        env.match_classes(a, b).expect("match classes");
        let m = method_id(&env, Side::A, "a", "m", "(I)V");
        let n = method_id(&env, Side::B, "b", "n", "(I)V");
        env.match_methods(m, n).expect("match methods");
        let (arg_m, arg_n) = (env.method(m).args()[0], env.method(n).args()[0]);
        env.match_vars(arg_m, arg_n).expect("match args");
        let f = field_id(&env, Side::A, "a", "f", "I");
        let k = field_id(&env, Side::B, "b", "k", "I");
        env.match_fields(f, k).expect("match fields");

        env.unmatch(EntityRef::Class(b));

        assert_eq!(None, env.class_match(a));
        assert_eq!(None, env.method_match(m));
        assert_eq!(None, env.method_match(n));
        assert_eq!(None, env.var_match(arg_n));
        assert_eq!(None, env.field_match(f));
        assert!(env.cache().is_empty());
    }

    #[test]
    fn rematching_dissolves_the_previous_pairs() {
        let mut env = build_env(
            vec![class("a", Some("java/lang/Object"))],
            vec![class("x", Some("java/lang/Object")), class("y", Some("java/lang/Object"))],
        );
        let a = class_id(&env, Side::A, "a");
        let x = class_id(&env, Side::B, "x");
        let y = class_id(&env, Side::B, "y");

        env.match_classes(a, x).expect("first");
        env.match_classes(a, y).expect("second");

        assert_eq!(Some(y), env.class_match(a));
        assert_eq!(None, env.class_match(x));
    }

    #[test]
    fn matched_hierarchies_carry_over_to_new_class_pairs() {
        let mut p = class("p", Some("java/lang/Object"));
        p.methods.push(method("m", "()V", Vec::new()));
        let mut q = class("q", Some("p"));
        q.methods.push(method("m", "()V", Vec::new()));
        let mut r = class("r", Some("java/lang/Object"));
        r.methods.push(method("z", "()V", Vec::new()));
        let mut s = class("s", Some("r"));
        s.methods.push(method("z", "()V", Vec::new()));
        let mut env = build_env(vec![p, q], vec![r, s]);

        let (p, q) = (class_id(&env, Side::A, "p"), class_id(&env, Side::A, "q"));
        let (r, s) = (class_id(&env, Side::B, "r"), class_id(&env, Side::B, "s"));
        env.match_classes(p, r).expect("match p");
        let pm = method_id(&env, Side::A, "p", "m", "()V");
        let rz = method_id(&env, Side::B, "r", "z", "()V");
        env.match_methods(pm, rz).expect("match p.m");
        env.match_classes(q, s).expect("match q");

        let qm = method_id(&env, Side::A, "q", "m", "()V");
        let sz = method_id(&env, Side::B, "s", "z", "()V");
        assert_eq!(Some(sz), env.method_match(qm));
    }

    #[test]
    fn variables_of_different_kinds_do_not_pair() {
        let mut env = pair_env();
        let a = class_id(&env, Side::A, "a");
        let b = class_id(&env, Side::B, "b");
        env.match_classes(a, b).expect("match classes");
        let m = method_id(&env, Side::A, "a", "m", "(I)V");
        let n = method_id(&env, Side::B, "b", "n", "(I)V");
        env.match_methods(m, n).expect("match methods");

        let (arg_m, arg_n) = (env.method(m).args()[0], env.method(n).args()[0]);
        env.vars[arg_n.index()].is_arg = false;
        let result = env.match_vars(arg_m, arg_n);

        assert!(matches!(result, Err(MatchError::VarKindMismatch { .. })));
    }

    #[test]
    fn unmatchable_entities_are_unmatched_and_refused() {
        let mut env = pair_env();
        let a = class_id(&env, Side::A, "a");
        let b = class_id(&env, Side::B, "b");
        env.match_classes(a, b).expect("match");

        env.set_matchable(EntityRef::Class(a), false);

        assert_eq!(None, env.class_match(b));
        assert!(matches!(env.match_classes(a, b), Err(MatchError::NotMatchable(_))));
    }
}
