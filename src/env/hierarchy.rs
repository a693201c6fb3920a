use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::debug;

use super::ClassEnvironment;
use crate::model::{ClassId, MethodId, member_key};

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let (a, b) = (self.find(a), self.find(b));
        if a != b {
            // Lowest index becomes the root so grouping order stays stable.
            let (root, child) = if a < b { (a, b) } else { (b, a) };
            self.parent[child] = root;
        }
    }
}

/// Every proper ancestor: the super class chain first, then interfaces breadth first.
pub(crate) fn ancestors(env: &ClassEnvironment, cls: ClassId) -> Vec<ClassId> {
    let mut result = Vec::new();
    let mut seen = BTreeSet::from([cls]);
    let mut current = env.class(cls).super_class;
    while let Some(next) = current {
        if !seen.insert(next) {
            break;
        }
        result.push(next);
        current = env.class(next).super_class;
    }

    let mut queue: VecDeque<ClassId> = std::iter::once(cls)
        .chain(result.iter().copied())
        .flat_map(|class| env.class(class).interfaces.iter().copied())
        .collect();
    while let Some(interface) = queue.pop_front() {
        if !seen.insert(interface) {
            continue;
        }
        result.push(interface);
        queue.extend(env.class(interface).interfaces.iter().copied());
    }
    result
}

/// Passes C and D: group overriding methods, link parents, settle obfuscation.
pub(super) fn compute(env: &mut ClassEnvironment) {
    let method_count = env.methods.len();
    let mut sets = UnionFind::new(method_count);
    let mut library_bound = vec![false; method_count];

    for cls in env.class_ids().collect::<Vec<_>>() {
        if env.class(cls).is_shared() {
            continue;
        }
        // Every non-barrier signature visible in the class, declared or inherited,
        // with the local declarations and whether a library class declares it too.
        let mut visible: BTreeMap<String, (Vec<MethodId>, bool)> = BTreeMap::new();
        for owner in std::iter::once(cls).chain(ancestors(env, cls)) {
            let owner_class = env.class(owner);
            for &method in &owner_class.methods {
                let instance = env.method(method);
                if instance.is_hierarchy_barrier() {
                    continue;
                }
                let entry = visible
                    .entry(member_key(&instance.name, &instance.desc))
                    .or_default();
                if owner_class.is_shared() {
                    entry.1 = true;
                } else {
                    entry.0.push(method);
                }
            }
        }
        for (declared, bound) in visible.into_values() {
            let Some((&first, rest)) = declared.split_first() else {
                continue;
            };
            for &other in rest {
                sets.union(first.index(), other.index());
            }
            if bound {
                for &method in &declared {
                    library_bound[method.index()] = true;
                }
            }
        }
    }

    let mut group_of_root = vec![usize::MAX; method_count];
    let mut hierarchies: Vec<Vec<MethodId>> = Vec::new();
    let mut bound_groups: Vec<bool> = Vec::new();
    for index in 0..method_count {
        let root = sets.find(index);
        if group_of_root[root] == usize::MAX {
            group_of_root[root] = hierarchies.len();
            hierarchies.push(Vec::new());
            bound_groups.push(false);
        }
        let group = group_of_root[root];
        hierarchies[group].push(MethodId::from_index(index));
        bound_groups[group] |= library_bound[index];
        env.methods[index].hierarchy = group;
    }

    for (members, bound) in hierarchies.iter().zip(bound_groups) {
        if members.len() < 2 && !bound {
            continue;
        }
        let clear = bound
            || members
                .iter()
                .any(|&method| !env.methods[method.index()].name_obfuscated);
        if clear {
            for &method in members {
                env.methods[method.index()].name_obfuscated = false;
            }
        }
    }
    debug!(
        hierarchies = hierarchies.len(),
        shared_identity = hierarchies.iter().filter(|members| members.len() > 1).count(),
        "grouped method hierarchies"
    );
    env.hierarchies = hierarchies;

    link_parents(env);
}

fn link_parents(env: &mut ClassEnvironment) {
    let mut links = Vec::new();
    for cls in env.class_ids() {
        let class = env.class(cls);
        if class.is_shared() {
            continue;
        }
        for &method in &class.methods {
            let instance = env.method(method);
            if instance.is_hierarchy_barrier() {
                continue;
            }
            let key = member_key(&instance.name, &instance.desc);
            let parent = ancestors(env, cls).into_iter().find_map(|ancestor| {
                env.class(ancestor)
                    .method_index
                    .get(&key)
                    .copied()
                    .filter(|&candidate| !env.method(candidate).is_hierarchy_barrier())
            });
            if let Some(parent) = parent {
                links.push((method, parent));
            }
        }
    }
    for (child, parent) in links {
        env.methods[child.index()].parent = Some(parent);
        env.methods[parent.index()].children.insert(child);
    }
}

#[cfg(test)]
mod tests {
    use crate::classfile::access;
    use crate::env::testing::*;
    use crate::model::Side;

    #[test]
    fn overriding_methods_share_one_hierarchy() {
        let mut a = class("a", Some("java/lang/Object"));
        a.methods.push(method("m", "()V", Vec::new()));
        let mut b = class("b", Some("a"));
        b.methods.push(method("m", "()V", Vec::new()));
        let mut c = class("c", Some("b"));
        c.methods.push(method("m", "()V", Vec::new()));
        c.methods.push(with_access(method("n", "()V", Vec::new()), access::PRIVATE));
        let mut d = class("d", Some("a"));
        d.methods.push(with_access(method("m", "()V", Vec::new()), access::STATIC));

        let env = build_env(vec![a, b, c, d], Vec::new());

        let am = method_id(&env, Side::A, "a", "m", "()V");
        let bm = method_id(&env, Side::A, "b", "m", "()V");
        let cm = method_id(&env, Side::A, "c", "m", "()V");
        let dm = method_id(&env, Side::A, "d", "m", "()V");
        assert_eq!(&[am, bm, cm], env.hierarchy_members(cm));
        assert_eq!(&[dm], env.hierarchy_members(dm));
        let cn = method_id(&env, Side::A, "c", "n", "()V");
        assert_eq!(&[cn], env.hierarchy_members(cn));

        assert_eq!(Some(bm), env.method(cm).parent());
        assert_eq!(Some(am), env.method(bm).parent());
        assert!(env.method(am).children().contains(&bm));
        assert_eq!(None, env.method(dm).parent());
    }

    #[test]
    fn interface_implementations_join_the_interface_hierarchy() {
        let mut api = class("i", Some("java/lang/Object"));
        api.access |= access::INTERFACE | access::ABSTRACT;
        api.methods.push(method("run", "()V", Vec::new()));
        let mut first = class("x", Some("java/lang/Object"));
        first.interfaces.push("i".to_string());
        first.methods.push(method("run", "()V", Vec::new()));
        let mut second = class("y", Some("java/lang/Object"));
        second.interfaces.push("i".to_string());
        second.methods.push(method("run", "()V", Vec::new()));

        let env = build_env(vec![api, first, second], Vec::new());

        let x = method_id(&env, Side::A, "x", "run", "()V");
        assert_eq!(3, env.hierarchy_members(x).len());
    }

    #[test]
    fn inherited_implementation_ties_interface_to_super_class() {
        let mut api = class("i", Some("java/lang/Object"));
        api.access |= access::INTERFACE | access::ABSTRACT;
        api.methods.push(method("m", "()V", Vec::new()));
        let mut base = class("b", Some("java/lang/Object"));
        base.methods.push(method("m", "()V", Vec::new()));
        let mut derived = class("c", Some("b"));
        derived.interfaces.push("i".to_string());

        let env = build_env(vec![api, base, derived], Vec::new());

        let im = method_id(&env, Side::A, "i", "m", "()V");
        let bm = method_id(&env, Side::A, "b", "m", "()V");
        let members = env.hierarchy_members(im);
        assert_eq!(2, members.len());
        assert!(members.contains(&bm));
        assert_eq!(members, env.hierarchy_members(bm));
    }

    #[test]
    fn library_overrides_are_not_obfuscated() {
        let mut a = class("a", Some("java/lang/Object"));
        a.methods.push(method("toString", "()Ljava/lang/String;", Vec::new()));
        a.methods.push(method("b", "()V", Vec::new()));

        let env = build_env(vec![a], Vec::new());

        let to_string = method_id(&env, Side::A, "a", "toString", "()Ljava/lang/String;");
        let plain = method_id(&env, Side::A, "a", "b", "()V");
        assert!(!env.method(to_string).is_name_obfuscated());
        assert!(env.method(plain).is_name_obfuscated());
        let object_to_string =
            method_id(&env, Side::A, "java/lang/Object", "toString", "()Ljava/lang/String;");
        assert_eq!(Some(object_to_string), env.method(to_string).parent());
        assert_eq!(&[to_string], env.hierarchy_members(to_string));
    }
}
