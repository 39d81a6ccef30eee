//! Role resolution.
//!
//! Launch Services describes the capacity an application handles a type in
//! with an `LSRolesMask`. The bits overlap (`kLSRolesAll` is every bit set),
//! so the engine never does mask arithmetic directly: it works on
//! [`RoleSet`], an explicit set of concrete roles, and only the adapter sees
//! raw masks.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::uti::TypeIdentifier;
use crate::Error;

pub const LS_ROLES_VIEWER: u32 = 0x0000_0002;
pub const LS_ROLES_EDITOR: u32 = 0x0000_0004;
pub const LS_ROLES_SHELL: u32 = 0x0000_0008;
pub const LS_ROLES_ALL: u32 = 0xFFFF_FFFF;

/// A single registry slot for a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcreteRole {
    Viewer,
    Editor,
    Shell,
}

impl ConcreteRole {
    pub const ALL: [ConcreteRole; 3] = [ConcreteRole::Viewer, ConcreteRole::Editor, ConcreteRole::Shell];

    pub fn name(&self) -> &'static str {
        match self {
            ConcreteRole::Viewer => "viewer",
            ConcreteRole::Editor => "editor",
            ConcreteRole::Shell => "shell",
        }
    }

    /// The `LSRolesMask` bit for this role.
    pub fn mask(&self) -> u32 {
        match self {
            ConcreteRole::Viewer => LS_ROLES_VIEWER,
            ConcreteRole::Editor => LS_ROLES_EDITOR,
            ConcreteRole::Shell => LS_ROLES_SHELL,
        }
    }

    fn bit(&self) -> u8 {
        match self {
            ConcreteRole::Viewer => 0b001,
            ConcreteRole::Editor => 0b010,
            ConcreteRole::Shell => 0b100,
        }
    }
}

impl fmt::Display for ConcreteRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A user-facing role token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Viewer,
    Editor,
    Shell,
    All,
}

impl Role {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "viewer" | "view" | "r" => Some(Role::Viewer),
            "editor" | "edit" | "w" => Some(Role::Editor),
            "shell" | "sh" => Some(Role::Shell),
            "all" | "*" => Some(Role::All),
            _ => None,
        }
    }
}

impl From<ConcreteRole> for Role {
    fn from(role: ConcreteRole) -> Self {
        match role {
            ConcreteRole::Viewer => Role::Viewer,
            ConcreteRole::Editor => Role::Editor,
            ConcreteRole::Shell => Role::Shell,
        }
    }
}

/// A non-empty set of concrete roles, iterated in viewer, editor, shell order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoleSet(u8);

impl RoleSet {
    pub const ALL: RoleSet = RoleSet(0b111);

    pub fn contains(&self, role: ConcreteRole) -> bool {
        self.0 & role.bit() != 0
    }

    pub fn is_all(&self) -> bool {
        *self == RoleSet::ALL
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = ConcreteRole> + '_ {
        ConcreteRole::ALL.into_iter().filter(move |r| self.contains(*r))
    }

    /// Combined `LSRolesMask`; the full set maps to `kLSRolesAll`.
    pub fn mask(&self) -> u32 {
        if self.is_all() {
            return LS_ROLES_ALL;
        }
        self.iter().fold(0, |mask, r| mask | r.mask())
    }

    fn insert(&mut self, role: ConcreteRole) {
        self.0 |= role.bit();
    }
}

impl From<ConcreteRole> for RoleSet {
    fn from(role: ConcreteRole) -> Self {
        RoleSet(role.bit())
    }
}

impl From<Role> for RoleSet {
    fn from(role: Role) -> Self {
        expand(role)
    }
}

impl FromStr for RoleSet {
    type Err = Error;

    /// Parse `viewer`, `all`, or a `+`/`,` joined combination such as
    /// `editor+viewer`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = RoleSet(0);
        for token in s.split(['+', ',']) {
            let role = Role::parse(token).ok_or_else(|| Error::InvalidRole(s.to_string()))?;
            for concrete in expand(role).iter() {
                set.insert(concrete);
            }
        }
        if set.is_empty() {
            return Err(Error::InvalidRole(s.to_string()));
        }
        Ok(set)
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            return f.write_str("all");
        }
        let names: Vec<&str> = self.iter().map(|r| r.name()).collect();
        f.write_str(&names.join("+"))
    }
}

impl Serialize for RoleSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Expand a role token into the concrete slots it covers.
pub fn expand(role: Role) -> RoleSet {
    match role {
        Role::Viewer => ConcreteRole::Viewer.into(),
        Role::Editor => ConcreteRole::Editor.into(),
        Role::Shell => ConcreteRole::Shell.into(),
        Role::All => RoleSet::ALL,
    }
}

/// Every (type, concrete role) pair a single request operates over.
pub fn resolve_assignment_targets(
    type_identifier: &TypeIdentifier,
    roles: RoleSet,
) -> Vec<(TypeIdentifier, ConcreteRole)> {
    roles.iter().map(|r| (type_identifier.clone(), r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_expands_to_three_roles() {
        let set = expand(Role::All);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![ConcreteRole::Viewer, ConcreteRole::Editor, ConcreteRole::Shell]
        );
        assert_eq!(set.mask(), LS_ROLES_ALL);
    }

    #[test]
    fn test_concrete_role_expands_to_itself() {
        let set = expand(Role::Editor);
        assert_eq!(set.len(), 1);
        assert!(set.contains(ConcreteRole::Editor));
        assert_eq!(set.mask(), LS_ROLES_EDITOR);
    }

    #[test]
    fn test_parse_combination() {
        let set: RoleSet = "editor+viewer".parse().unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![ConcreteRole::Viewer, ConcreteRole::Editor]);
        assert_eq!(set.mask(), LS_ROLES_VIEWER | LS_ROLES_EDITOR);
        assert_eq!(set.to_string(), "viewer+editor");
    }

    #[test]
    fn test_parse_combination_covering_everything_is_all() {
        let set: RoleSet = "shell,editor,viewer".parse().unwrap();
        assert!(set.is_all());
        assert_eq!(set.to_string(), "all");
    }

    #[test]
    fn test_parse_rejects_unknown_token() {
        assert!(matches!("viewer+owner".parse::<RoleSet>(), Err(Error::InvalidRole(_))));
        assert!(matches!("".parse::<RoleSet>(), Err(Error::InvalidRole(_))));
    }
}
