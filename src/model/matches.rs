use std::collections::HashMap;
use std::hash::Hash;

use super::{ClassId, FieldId, MethodId, VarId};

/// Symmetric partner table for one entity kind.
#[derive(Clone, Debug)]
pub(crate) struct PairTable<I> {
    partners: HashMap<I, I>,
}

impl<I> Default for PairTable<I> {
    fn default() -> Self {
        Self {
            partners: HashMap::new(),
        }
    }
}

impl<I: Copy + Eq + Hash + std::fmt::Debug> PairTable<I> {
    pub(crate) fn get(&self, id: I) -> Option<I> {
        self.partners.get(&id).copied()
    }

    /// Pair two unpaired entities.
    pub(crate) fn link(&mut self, a: I, b: I) {
        assert!(
            !self.partners.contains_key(&a) && !self.partners.contains_key(&b),
            "linking already matched entities {a:?} <-> {b:?}"
        );
        self.partners.insert(a, b);
        self.partners.insert(b, a);
    }

    /// Remove the pair containing `id`, returning the former partner.
    pub(crate) fn unlink(&mut self, id: I) -> Option<I> {
        let partner = self.partners.remove(&id)?;
        let back = self.partners.remove(&partner);
        assert_eq!(Some(id), back, "asymmetric match entry for {id:?}");
        Some(partner)
    }

    pub(crate) fn clear(&mut self) {
        self.partners.clear();
    }

    pub(crate) fn pair_count(&self) -> usize {
        self.partners.len() / 2
    }
}

/// Explicit bidirectional match state for every entity kind.
#[derive(Clone, Debug, Default)]
pub(crate) struct MatchTable {
    pub(crate) classes: PairTable<ClassId>,
    pub(crate) methods: PairTable<MethodId>,
    pub(crate) fields: PairTable<FieldId>,
    pub(crate) vars: PairTable<VarId>,
}

impl MatchTable {
    pub(crate) fn clear(&mut self) {
        self.classes.clear();
        self.methods.clear();
        self.fields.clear();
        self.vars.clear();
    }
}
