use facet::Facet;

/// A loadable unit of code: a named owner, the types it declares, and its
/// members.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    /// Interfaces / capability markers this artifact declares.
    pub supertypes: Vec<String>,
    pub members: Vec<Member>,
}

impl Artifact {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertypes: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn declares(&self, ty: &str) -> bool {
        self.supertypes.iter().any(|s| s == ty)
    }

    pub fn member(&self, name: &str, desc: &str) -> Option<&Member> {
        self.members
            .iter()
            .find(|m| m.name == name && m.desc == desc)
    }

    pub fn member_mut(&mut self, name: &str, desc: &str) -> Option<&mut Member> {
        self.members
            .iter_mut()
            .find(|m| m.name == name && m.desc == desc)
    }

    /// Number of members carrying `name`, regardless of descriptor.
    pub fn count_named(&self, name: &str) -> usize {
        self.members.iter().filter(|m| m.name == name).count()
    }
}

#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub desc: String,
    pub access: Access,
    pub code: Vec<Insn>,
}

impl Member {
    pub fn new(name: impl Into<String>, desc: impl Into<String>, access: Access) -> Self {
        Self {
            name: name.into(),
            desc: desc.into(),
            access,
            code: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: Vec<Insn>) -> Self {
        self.code = code;
        self
    }

    /// One past the highest label id used in this member's code, or `None`
    /// when `u32::MAX` is already taken.
    pub fn next_label(&self) -> Option<u32> {
        self.code
            .iter()
            .filter_map(|insn| match insn {
                Insn::Label { id } => Some(*id),
                Insn::IfEq { target } | Insn::Goto { target } => Some(*target),
                _ => None,
            })
            .max()
            .map_or(Some(0), |max| max.checked_add(1))
    }
}

#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum Access {
    Public,
    Private,
}

#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum InvokeKind {
    Static,
    Virtual,
    Interface,
    Special,
}

/// Stack-machine instructions. Stack effects are written as
/// `[before] => [after]`, top of stack last.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum Insn {
    /// `[] => [local]`
    Load { slot: u16 },
    /// `[value] => []`
    Store { slot: u16 },
    /// `[] => [constant]`
    Const { value: i64 },
    /// `[receiver?, args..] => [result?]`
    Invoke {
        kind: InvokeKind,
        owner: String,
        name: String,
        desc: String,
    },
    /// `[value] => [bool]`
    InstanceOf { ty: String },
    /// `[value] => [value]`
    CheckCast { ty: String },
    /// `[a] => []`
    Pop,
    /// `[a, b] => []`
    Pop2,
    /// `[a] => [a, a]`
    Dup,
    /// `[a, b, c] => [c, a, b, c]`
    DupX2,
    /// `[a, b, c] => [b, c, a, b, c]`
    Dup2X1,
    Label { id: u32 },
    /// `[bool] => []`, jumps when false.
    IfEq { target: u32 },
    Goto { target: u32 },
    Return,
    /// `[value] => []`
    ReturnValue,
}

impl Insn {
    pub fn invoke(
        kind: InvokeKind,
        owner: impl Into<String>,
        name: impl Into<String>,
        desc: impl Into<String>,
    ) -> Self {
        Self::Invoke {
            kind,
            owner: owner.into(),
            name: name.into(),
            desc: desc.into(),
        }
    }

    pub fn is_invoke_of(&self, member: &str, member_desc: &str) -> bool {
        matches!(self, Self::Invoke { name, desc, .. } if name == member && desc == member_desc)
    }
}
