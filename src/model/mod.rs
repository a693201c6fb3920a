mod class;
mod matches;
mod member;

pub use class::{ClassInstance, ClassOrigin, RecordLink};
pub(crate) use class::member_key;
pub(crate) use matches::MatchTable;
pub use member::{FieldInstance, MethodInstance, MethodVarInstance, NumberConstant};

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }

            pub(crate) fn from_index(index: usize) -> Self {
                Self(u32::try_from(index).expect("entity arena exceeds u32::MAX entries"))
            }
        }
    };
}

entity_id!(
    /// Handle of a class in the environment arena.
    ClassId
);
entity_id!(
    /// Handle of a method in the environment arena.
    MethodId
);
entity_id!(
    /// Handle of a field in the environment arena.
    FieldId
);
entity_id!(
    /// Handle of a method argument or local variable.
    VarId
);

/// One of the two independently compiled inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::A, Side::B];

    pub fn other(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    pub fn tag(self) -> char {
        match self {
            Side::A => 'a',
            Side::B => 'b',
        }
    }

    pub(crate) fn slot(self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }
}

/// Any matchable entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityRef {
    Class(ClassId),
    Method(MethodId),
    Field(FieldId),
    Var(VarId),
}

impl From<ClassId> for EntityRef {
    fn from(id: ClassId) -> Self {
        EntityRef::Class(id)
    }
}

impl From<MethodId> for EntityRef {
    fn from(id: MethodId) -> Self {
        EntityRef::Method(id)
    }
}

impl From<FieldId> for EntityRef {
    fn from(id: FieldId) -> Self {
        EntityRef::Field(id)
    }
}

impl From<VarId> for EntityRef {
    fn from(id: VarId) -> Self {
        EntityRef::Var(id)
    }
}

/// Which name of an entity to present.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NameType {
    /// Name as found in the bytecode.
    #[default]
    Plain,
    /// Mapped name only, `None` when unmapped.
    Mapped,
    /// Temporary scratch name only, `None` for unobfuscated entities.
    Tmp,
    /// Mapped name, falling back to the plain name.
    MappedPlain,
    /// Mapped name, then temporary name, then plain name.
    MappedTmpPlain,
}
