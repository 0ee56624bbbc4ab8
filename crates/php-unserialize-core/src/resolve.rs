//! Back-reference resolution.
//!
//! The decoder leaves `r:`/`R:` tokens in the tree as
//! [`Value::Reference`]. Resolution rebuilds the reference table from the
//! decoded tree (it is a pre-order walk with the same slot rules the parser
//! applies) and replaces each reference with a copy of its target.

use std::ptr;

#[cfg(feature = "tracing")]
use tracing::warn;

use crate::parser::ParserConfig;
use crate::types::{ReferenceKind, Value};

impl<'a> Value<'a> {
    /// Return a copy of this tree with every back-reference replaced by the
    /// value it points to, using the default [`ParserConfig`] limits.
    ///
    /// A reference to a container that encloses it (a cycle) cannot be
    /// expanded into a finite tree and is left in place.
    ///
    /// Returns `None` when the expansion would nest deeper than
    /// `max_depth` or produce more than `max_expanded_elements` values.
    ///
    /// ```rust
    /// use php_unserialize_core::{from_bytes, Value};
    ///
    /// let value = from_bytes(b"a:4:{i:0;i:1;i:1;R:2;i:2;i:2;i:3;i:3;}").unwrap();
    /// let resolved = value.resolve_references().unwrap();
    /// let ints: Vec<_> = resolved
    ///     .as_array()
    ///     .unwrap()
    ///     .iter()
    ///     .map(|(_, v)| v.as_int().unwrap())
    ///     .collect();
    /// assert_eq!(ints, [1, 1, 2, 3]);
    /// ```
    pub fn resolve_references(&self) -> Option<Value<'a>> {
        self.resolve_references_with_config(&ParserConfig::default())
    }

    /// Like [`Value::resolve_references`], with explicit limits.
    pub fn resolve_references_with_config(&self, config: &ParserConfig) -> Option<Value<'a>> {
        let mut slots = Vec::new();
        collect_slots(self, &mut slots);

        let mut resolver = Resolver {
            slots,
            active: Vec::new(),
            max_depth: config.max_depth,
            max_elements: config.max_expanded_elements,
            elements: 0,
        };
        let resolved = resolver.resolve(self);

        #[cfg(feature = "tracing")]
        if resolved.is_none() {
            warn!(
                max_depth = config.max_depth,
                max_expanded_elements = config.max_expanded_elements,
                produced = resolver.elements,
                "Reference expansion exceeded limits"
            );
        }

        resolved
    }

    /// Whether any back-reference remains in the tree.
    pub fn has_references(&self) -> bool {
        match self {
            Value::Reference { .. } => true,
            Value::Array(pairs) | Value::Object { properties: pairs, .. } => {
                pairs.iter().any(|(_, v)| v.has_references())
            }
            _ => false,
        }
    }
}

/// Rebuild the 1-based slot table in decode order.
fn collect_slots<'v, 'a>(value: &'v Value<'a>, slots: &mut Vec<&'v Value<'a>>) {
    if !matches!(
        value,
        Value::Reference {
            kind: ReferenceKind::Alias,
            ..
        }
    ) {
        slots.push(value);
    }

    if let Value::Array(pairs) | Value::Object { properties: pairs, .. } = value {
        for (_, child) in pairs {
            collect_slots(child, slots);
        }
    }
}

struct Resolver<'v, 'a> {
    slots: Vec<&'v Value<'a>>,
    /// Containers and references currently being expanded, outermost first.
    active: Vec<&'v Value<'a>>,
    max_depth: usize,
    max_elements: usize,
    /// Values and keys produced so far.
    elements: usize,
}

impl<'v, 'a> Resolver<'v, 'a> {
    fn resolve(&mut self, value: &'v Value<'a>) -> Option<Value<'a>> {
        self.count_element()?;

        match value {
            Value::Reference { index, .. } => {
                let target = index
                    .checked_sub(1)
                    .and_then(|slot| self.slots.get(slot))
                    .copied();
                match target {
                    Some(target) if !self.is_active(target) => {
                        self.descend(value, |r| r.resolve(target))
                    }
                    _ => Some(value.clone()),
                }
            }
            Value::Array(pairs) => self
                .descend(value, |r| r.resolve_pairs(pairs))
                .map(Value::Array),
            Value::Object {
                class_name,
                properties,
            } => {
                let properties = self.descend(value, |r| r.resolve_pairs(properties))?;
                Some(Value::Object {
                    class_name: class_name.clone(),
                    properties,
                })
            }
            other => Some(other.clone()),
        }
    }

    fn resolve_pairs(
        &mut self,
        pairs: &'v [(Value<'a>, Value<'a>)],
    ) -> Option<Vec<(Value<'a>, Value<'a>)>> {
        pairs
            .iter()
            .map(|(k, v)| {
                self.count_element()?;
                Some((k.clone(), self.resolve(v)?))
            })
            .collect()
    }

    /// Expand `value` one level deeper. Reference hops count as a level, so
    /// long reference chains are bounded like deep nesting.
    fn descend<T>(
        &mut self,
        value: &'v Value<'a>,
        expand: impl FnOnce(&mut Self) -> Option<T>,
    ) -> Option<T> {
        if self.active.len() >= self.max_depth {
            return None;
        }
        self.active.push(value);
        let expanded = expand(self);
        self.active.pop();
        expanded
    }

    #[inline]
    fn count_element(&mut self) -> Option<()> {
        self.elements += 1;
        (self.elements <= self.max_elements).then_some(())
    }

    fn is_active(&self, target: &Value<'a>) -> bool {
        self.active.iter().any(|a| ptr::eq(*a, target))
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use crate::parser::ParserConfig;
    use crate::types::{ReferenceKind, Value};
    use crate::{from_bytes, is_serialized};

    /// Outer array of `levels` entries. Entry 0 is an empty array, entry k
    /// holds two `r:` references to entry k - 1, so every level doubles the
    /// expanded size.
    fn doubling_chain(levels: usize) -> String {
        let slot = |k: usize| if k == 0 { 2 } else { 3 * k };
        let mut entries = String::from("i:0;a:0:{}");
        for k in 1..levels {
            let prev = slot(k - 1);
            entries.push_str(&format!("i:{};a:2:{{i:0;r:{};i:1;r:{};}}", k, prev, prev));
        }
        format!("a:{}:{{{}}}", levels, entries)
    }

    /// Outer array of `levels` entries, each holding one `r:` reference to
    /// the entry before it, so the expansion nests `levels` deep.
    fn reference_chain(levels: usize) -> String {
        let slot = |k: usize| if k == 0 { 2 } else { 2 * k + 1 };
        let mut entries = String::from("i:0;a:0:{}");
        for k in 1..levels {
            entries.push_str(&format!("i:{};a:1:{{i:0;r:{};}}", k, slot(k - 1)));
        }
        format!("a:{}:{{{}}}", levels, entries)
    }

    #[test]
    fn test_alias_resolves_to_value() {
        let value = from_bytes(b"a:4:{i:0;i:1;i:1;R:2;i:2;i:2;i:3;i:3;}").unwrap();
        let resolved = value.resolve_references().unwrap();
        assert_eq!(
            resolved,
            Value::Array(vec![
                (Value::Int(0), Value::Int(1)),
                (Value::Int(1), Value::Int(1)),
                (Value::Int(2), Value::Int(2)),
                (Value::Int(3), Value::Int(3)),
            ])
        );
        assert!(!resolved.has_references());
    }

    #[test]
    fn test_object_reference_copies_container() {
        let data = b"a:2:{i:0;O:8:\"stdClass\":1:{s:1:\"a\";i:5;}i:1;r:2;}";
        let resolved = from_bytes(data).unwrap().resolve_references().unwrap();
        let items = resolved.as_array().unwrap();
        assert_eq!(items[0].1, items[1].1);
        assert_eq!(items[1].1.class_name(), Some(&b"stdClass"[..]));
    }

    #[test]
    fn test_reference_to_value_reference() {
        // Slot 3 is the r:2 token itself, which resolves to slot 2
        let data = b"a:3:{i:0;s:1:\"v\";i:1;r:2;i:2;R:3;}";
        let resolved = from_bytes(data).unwrap().resolve_references().unwrap();
        let items = resolved.as_array().unwrap();
        let v = Value::String(Cow::Borrowed(b"v"));
        assert_eq!(items[1].1, v);
        assert_eq!(items[2].1, v);
    }

    #[test]
    fn test_cycle_is_left_in_place() {
        let value = from_bytes(b"a:1:{i:0;R:1;}").unwrap();
        let resolved = value.resolve_references().unwrap();
        assert_eq!(resolved, value);
        assert!(resolved.has_references());
    }

    #[test]
    fn test_nested_cycle_expands_once() {
        // Outer array (1) holds inner array (2) which points back at the outer one;
        // the outer array's second entry points at the inner array.
        let data = b"a:2:{i:0;a:1:{i:0;R:1;}i:1;R:2;}";
        let resolved = from_bytes(data).unwrap().resolve_references().unwrap();
        let items = resolved.as_array().unwrap();
        let inner = Value::Array(vec![(
            Value::Int(0),
            Value::Reference {
                index: 1,
                kind: ReferenceKind::Alias,
            },
        )]);
        assert_eq!(items[0].1, inner);
        assert_eq!(items[1].1, inner);
    }

    #[test]
    fn test_scalars_unchanged() {
        let value = from_bytes(b"s:3:\"foo\";").unwrap();
        assert_eq!(value.resolve_references(), Some(value));
    }

    #[test]
    fn test_doubling_chain_within_budget() {
        let data = doubling_chain(4);
        let value = from_bytes(data.as_bytes()).unwrap();
        let resolved = value.resolve_references().unwrap();
        assert!(!resolved.has_references());

        let last = &resolved.as_array().unwrap()[3].1;
        let (_, child) = &last.as_array().unwrap()[0];
        let (_, grandchild) = &child.as_array().unwrap()[1];
        assert_eq!(grandchild.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_doubling_chain_exceeds_expansion_budget() {
        let data = doubling_chain(40);
        let value = from_bytes(data.as_bytes()).unwrap();
        assert_eq!(value.resolve_references(), None);

        let config = ParserConfig {
            max_expanded_elements: 100,
            ..Default::default()
        };
        assert!(from_bytes(doubling_chain(4).as_bytes())
            .unwrap()
            .resolve_references_with_config(&config)
            .is_some());
        assert_eq!(
            from_bytes(doubling_chain(8).as_bytes())
                .unwrap()
                .resolve_references_with_config(&config),
            None
        );

        assert_eq!(is_serialized(&data), (false, None));
    }

    #[test]
    fn test_reference_chain_bounded_by_depth() {
        let max_depth = ParserConfig::default().max_depth;

        let short = reference_chain(max_depth / 4);
        let resolved = from_bytes(short.as_bytes())
            .unwrap()
            .resolve_references()
            .unwrap();
        assert!(!resolved.has_references());

        let long = reference_chain(5000);
        let value = from_bytes(long.as_bytes()).unwrap();
        assert_eq!(value.resolve_references(), None);
        assert_eq!(is_serialized(&long), (false, None));
    }
}
