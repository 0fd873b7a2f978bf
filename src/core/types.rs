use std::fmt;
use serde::{Serialize, Deserialize};

/// Width of a serialized id, in bytes
pub const ID_SIZE: usize = 4;

/// Dense internal identifier substituting for an external string id.
/// `Id(0)` is reserved and never assigned to a real resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Id(pub u32);

impl Id {
    pub const NONE: Id = Id(0);

    pub fn new(id: u32) -> Self {
        Id(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    pub fn to_le_bytes(self) -> [u8; ID_SIZE] {
        self.0.to_le_bytes()
    }
}

impl From<u32> for Id {
    fn from(id: u32) -> Self {
        Id(id)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Interned resource type name. `Tag::UNTYPED` matches resources stored without a type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag(pub u32);

impl Tag {
    pub const UNTYPED: Tag = Tag(0);
}

/// Which payload projection of a resource is wanted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Projection {
    Summary,
    Detailed,
}

impl Projection {
    pub fn from_detailed(detailed: bool) -> Self {
        if detailed { Projection::Detailed } else { Projection::Summary }
    }

    pub fn is_detailed(&self) -> bool {
        matches!(self, Projection::Detailed)
    }
}
