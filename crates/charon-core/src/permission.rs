//! The permission algebra.
//!
//! A [`Permission`] is an immutable `(subsystem, module, action)` triple
//! written as `"subsystem:module:action"`. [`Permissions`] is an ordered
//! collection of them, used both as a declared catalogue and as the
//! effective grant set of an actor.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::iter;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoreError, Result};

/// Separator between the three segments of a permission identifier.
pub const SEPARATOR: char = ':';

/// A single permission identifier.
///
/// Equality and ordering are defined over the formatted string, so
/// `a:b:c < a:b:d` and `a:b c:d < a:b:c` hold exactly as they would for
/// the colon-joined text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Permission {
    subsystem: Cow<'static, str>,
    module: Cow<'static, str>,
    action: Cow<'static, str>,
}

impl Permission {
    /// Build a permission from static segments without validation.
    ///
    /// Used for the compiled-in catalogue; every entry is covered by a
    /// round-trip test.
    pub const fn from_static(
        subsystem: &'static str,
        module: &'static str,
        action: &'static str,
    ) -> Self {
        Self {
            subsystem: Cow::Borrowed(subsystem),
            module: Cow::Borrowed(module),
            action: Cow::Borrowed(action),
        }
    }

    /// Build a permission from its segments.
    ///
    /// Fails if any segment contains the separator or the subsystem is empty.
    pub fn new(
        subsystem: impl Into<String>,
        module: impl Into<String>,
        action: impl Into<String>,
    ) -> Result<Self> {
        let (subsystem, module, action) = (subsystem.into(), module.into(), action.into());

        if subsystem.is_empty() {
            return Err(CoreError::MalformedPermission(format!(
                "empty subsystem in {subsystem}:{module}:{action}"
            )));
        }
        for segment in [&subsystem, &module, &action] {
            if segment.contains(SEPARATOR) {
                return Err(CoreError::MalformedPermission(format!(
                    "segment {segment:?} contains a separator"
                )));
            }
        }

        Ok(Self {
            subsystem: Cow::Owned(subsystem),
            module: Cow::Owned(module),
            action: Cow::Owned(action),
        })
    }

    /// Parse the colon-delimited form.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.split(SEPARATOR);
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(subsystem), Some(module), Some(action), None) => {
                Self::new(subsystem, module, action).map_err(|_| malformed(s))
            }
            _ => Err(malformed(s)),
        }
    }

    pub fn subsystem(&self) -> &str {
        &self.subsystem
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// The three segments in order.
    pub fn split(&self) -> (&str, &str, &str) {
        (&self.subsystem, &self.module, &self.action)
    }

    /// Bytes of the formatted identifier, without allocating.
    fn formatted_bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.subsystem
            .bytes()
            .chain(iter::once(SEPARATOR as u8))
            .chain(self.module.bytes())
            .chain(iter::once(SEPARATOR as u8))
            .chain(self.action.bytes())
    }
}

fn malformed(s: &str) -> CoreError {
    CoreError::MalformedPermission(format!(
        "expected subsystem:module:action with non-empty subsystem, got {s:?}"
    ))
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.subsystem, self.module, self.action
        )
    }
}

impl FromStr for Permission {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Ord for Permission {
    fn cmp(&self, other: &Self) -> Ordering {
        self.formatted_bytes().cmp(other.formatted_bytes())
    }
}

impl PartialOrd for Permission {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// An ordered collection of permissions.
///
/// Order is insertion order. Membership checks scan linearly; actors hold
/// tens of permissions at most.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(Vec<Permission>);

impl Permissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every string, failing on the first malformed one.
    pub fn parse_all<I, S>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        items
            .into_iter()
            .map(|s| Permission::parse(s.as_ref()))
            .collect()
    }

    /// True iff ANY of the candidates is present.
    ///
    /// Returns false when no candidate is given. Callers that need every
    /// permission must check each one separately.
    pub fn contains(&self, candidates: &[Permission]) -> bool {
        candidates.iter().any(|c| self.has(c))
    }

    /// True iff the single permission is present.
    pub fn has(&self, permission: &Permission) -> bool {
        self.0.iter().any(|p| p == permission)
    }

    pub fn push(&mut self, permission: Permission) {
        self.0.push(permission);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Permission> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Permission] {
        &self.0
    }

    /// The common subsystem of a non-empty batch.
    ///
    /// Fails on an empty batch, an empty subsystem, or mixed subsystems.
    pub fn single_subsystem(&self) -> Result<&str> {
        let first = self.0.first().ok_or(CoreError::EmptyPermissions)?;
        let subsystem = first.subsystem();
        if subsystem.is_empty() {
            return Err(CoreError::EmptySubsystem);
        }
        if let Some(other) = self.0.iter().find(|p| p.subsystem() != subsystem) {
            return Err(CoreError::InconsistentSubsystem {
                expected: subsystem.to_string(),
                got: other.subsystem().to_string(),
            });
        }
        Ok(subsystem)
    }

    /// Formatted identifiers in collection order.
    pub fn strings(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }

    pub fn into_vec(self) -> Vec<Permission> {
        self.0
    }
}

impl From<Vec<Permission>> for Permissions {
    fn from(v: Vec<Permission>) -> Self {
        Self(v)
    }
}

impl From<&[Permission]> for Permissions {
    fn from(v: &[Permission]) -> Self {
        Self(v.to_vec())
    }
}

impl FromIterator<Permission> for Permissions {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Permissions {
    type Item = Permission;
    type IntoIter = std::vec::IntoIter<Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Permissions {
    type Item = &'a Permission;
    type IntoIter = std::slice::Iter<'a, Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn p(s: &str) -> Permission {
        Permission::parse(s).unwrap()
    }

    #[test]
    fn test_parse_and_format() {
        let perm = p("charon:user:can create");
        assert_eq!(perm.split(), ("charon", "user", "can create"));
        assert_eq!(perm.to_string(), "charon:user:can create");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "a", "a:b", "a:b:c:d", ":b:c", "::", "a:b:c:"] {
            assert!(
                matches!(Permission::parse(bad), Err(CoreError::MalformedPermission(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_empty_module_and_action_allowed() {
        let perm = p("a::");
        assert_eq!(perm.split(), ("a", "", ""));
    }

    #[test]
    fn test_new_rejects_separator_in_segment() {
        assert!(Permission::new("a", "b:c", "d").is_err());
        assert!(Permission::new("", "b", "d").is_err());
    }

    #[test]
    fn test_ordering_follows_formatted_string() {
        // ' ' sorts before ':' so "a:b :x" < "a:b:x" as strings even though
        // "b" < "b " as a module.
        let mut perms = vec![p("a:b:x"), p("a:b :x"), p("a:a:z")];
        perms.sort();
        let sorted: Vec<String> = perms.iter().map(ToString::to_string).collect();
        assert_eq!(sorted, vec!["a:a:z", "a:b :x", "a:b:x"]);
    }

    #[test]
    fn test_contains_is_any_of() {
        let set = Permissions::from(vec![p("a:b:c")]);
        assert!(set.contains(&[p("x:y:z"), p("a:b:c")]));
        assert!(set.contains(&[p("a:b:c"), p("x:y:z")]));
        assert!(!set.contains(&[p("x:y:z"), p("q:w:e")]));
        assert!(!set.contains(&[]));
    }

    #[test]
    fn test_single_subsystem() {
        assert!(matches!(
            Permissions::new().single_subsystem(),
            Err(CoreError::EmptyPermissions)
        ));
        let mixed = Permissions::parse_all(["a:b:c", "b:b:c"]).unwrap();
        assert!(matches!(
            mixed.single_subsystem(),
            Err(CoreError::InconsistentSubsystem { .. })
        ));
        let same = Permissions::parse_all(["a:b:c", "a:bb:cc"]).unwrap();
        assert_eq!(same.single_subsystem().unwrap(), "a");
    }

    #[test]
    fn test_serde_uses_string_form() {
        let perm = p("charon:group:can modify");
        let json = serde_json::to_string(&perm).unwrap();
        assert_eq!(json, "\"charon:group:can modify\"");
        let back: Permission = serde_json::from_str(&json).unwrap();
        assert_eq!(back, perm);
        assert!(serde_json::from_str::<Permission>("\"nope\"").is_err());
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-z _]{0,8}"
    }

    proptest! {
        #[test]
        fn prop_parse_format_roundtrip(
            subsystem in "[a-z_]{1,8}",
            module in segment(),
            action in segment(),
        ) {
            let perm = Permission::new(subsystem, module, action).unwrap();
            prop_assert_eq!(Permission::parse(&perm.to_string()).unwrap(), perm);
        }

        #[test]
        fn prop_contains_is_or(
            held in proptest::collection::vec(0u8..6, 0..6),
            a in 0u8..6,
            b in 0u8..6,
        ) {
            let perm = |i: u8| Permission::new("s", "m", format!("a{i}")).unwrap();
            let set: Permissions = held.iter().map(|&i| perm(i)).collect();
            let expected = held.contains(&a) || held.contains(&b);
            prop_assert_eq!(set.contains(&[perm(a), perm(b)]), expected);
        }

        #[test]
        fn prop_ordering_matches_string_ordering(
            a in ("[a-c]{1,2}", "[ a-c]{0,2}", "[ a-c]{0,2}"),
            b in ("[a-c]{1,2}", "[ a-c]{0,2}", "[ a-c]{0,2}"),
        ) {
            let pa = Permission::new(a.0, a.1, a.2).unwrap();
            let pb = Permission::new(b.0, b.1, b.2).unwrap();
            prop_assert_eq!(pa.cmp(&pb), pa.to_string().cmp(&pb.to_string()));
        }
    }
}
