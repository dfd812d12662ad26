//! Labeled axes: ordered, unique keys along one dimension.

use crate::domain::error::PanelError;
use crate::domain::label::{Key, Label, LabelKind};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    names: Vec<String>,
    keys: Vec<Key>,
    positions: HashMap<Key, usize>,
}

impl Axis {
    /// Build an axis, rejecting keys with the wrong number of levels and
    /// duplicate keys.
    pub fn new(names: Vec<String>, keys: Vec<Key>) -> Result<Self, PanelError> {
        if names.is_empty() {
            return Err(PanelError::shape("an axis needs at least one level"));
        }
        let mut positions = HashMap::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            if key.nlevels() != names.len() {
                return Err(PanelError::shape(format!(
                    "key {} has {} levels, axis has {}",
                    key,
                    key.nlevels(),
                    names.len()
                )));
            }
            if positions.insert(key.clone(), i).is_some() {
                return Err(PanelError::shape(format!("duplicate key {} on axis", key)));
            }
        }
        Ok(Self {
            names,
            keys,
            positions,
        })
    }

    pub fn single(name: &str, labels: Vec<Label>) -> Result<Self, PanelError> {
        Self::new(
            vec![name.to_string()],
            labels.into_iter().map(Key::from).collect(),
        )
    }

    pub fn composite(
        outer: &str,
        inner: &str,
        pairs: Vec<(Label, Label)>,
    ) -> Result<Self, PanelError> {
        Self::new(
            vec![outer.to_string(), inner.to_string()],
            pairs.into_iter().map(|(o, i)| Key::pair(o, i)).collect(),
        )
    }

    /// One-key, one-level axis.
    pub fn unit(name: &str, label: Label) -> Self {
        let key = Key::from(label);
        Self {
            names: vec![name.to_string()],
            positions: HashMap::from([(key.clone(), 0)]),
            keys: vec![key],
        }
    }

    pub fn empty(names: Vec<String>) -> Self {
        Self {
            names,
            keys: Vec::new(),
            positions: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn nlevels(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn key(&self, position: usize) -> &Key {
        &self.keys[position]
    }

    pub fn position(&self, key: &Key) -> Option<usize> {
        self.positions.get(key).copied()
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.positions.contains_key(key)
    }

    /// The label kind shared by every key on `level`, or `None` when the
    /// axis is empty or the level mixes kinds.
    pub fn level_kind(&self, level: usize) -> Option<LabelKind> {
        let mut kinds = self.keys.iter().map(|k| k.level(level).kind());
        let first = kinds.next()?;
        kinds.all(|k| k == first).then_some(first)
    }

    /// Distinct labels on `level`, in order of first appearance.
    pub fn unique_level(&self, level: usize) -> Vec<Label> {
        let mut seen = HashSet::new();
        self.keys
            .iter()
            .map(|k| k.level(level))
            .filter(|l| seen.insert((*l).clone()))
            .cloned()
            .collect()
    }

    pub fn level_contains(&self, level: usize, label: &Label) -> bool {
        self.keys.iter().any(|k| k.level(level) == label)
    }

    /// Sub-axis at the given positions. Positions must be distinct.
    pub fn take(&self, positions: &[usize]) -> Axis {
        let keys: Vec<Key> = positions.iter().map(|&p| self.keys[p].clone()).collect();
        let index = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), i))
            .collect();
        Axis {
            names: self.names.clone(),
            keys,
            positions: index,
        }
    }

    /// Axis with one level removed. Fails if the remaining keys collide.
    pub fn drop_level(&self, level: usize) -> Result<Axis, PanelError> {
        if self.nlevels() < 2 {
            return Err(PanelError::dimension(
                "cannot drop the only level of an axis",
            ));
        }
        let names = self
            .names
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != level)
            .map(|(_, n)| n.clone())
            .collect();
        let keys = self.keys.iter().map(|k| k.without_level(level)).collect();
        Axis::new(names, keys)
    }

    /// Positions that would sort the axis by key.
    pub fn argsort(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.keys.len()).collect();
        order.sort_by(|&a, &b| self.keys[a].cmp(&self.keys[b]));
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(day: u32) -> Label {
        Label::Date(NaiveDate::from_ymd_opt(2024, 1, day).unwrap())
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let result = Axis::composite(
            "date",
            "asset",
            vec![(d(1), "A".into()), (d(1), "A".into())],
        );
        assert!(matches!(result, Err(PanelError::Shape { .. })));
    }

    #[test]
    fn mismatched_levels_are_rejected() {
        let result = Axis::new(
            vec!["date".into()],
            vec![Key::single(d(1)), Key::pair(d(2), "A")],
        );
        assert!(matches!(result, Err(PanelError::Shape { .. })));
    }

    #[test]
    fn level_kind_detects_mixed_labels() {
        let axis = Axis::single("x", vec![d(1), "A".into()]).unwrap();
        assert_eq!(axis.level_kind(0), None);

        let axis = Axis::single("x", vec![d(1), d(2)]).unwrap();
        assert_eq!(axis.level_kind(0), Some(LabelKind::Date));
    }

    #[test]
    fn unique_level_keeps_first_appearance_order() {
        let axis = Axis::composite(
            "date",
            "asset",
            vec![
                (d(2), "B".into()),
                (d(1), "A".into()),
                (d(2), "A".into()),
            ],
        )
        .unwrap();
        assert_eq!(axis.unique_level(0), vec![d(2), d(1)]);
        assert_eq!(axis.unique_level(1), vec!["B".into(), "A".into()]);
    }

    #[test]
    fn drop_level_detects_collisions() {
        let axis = Axis::composite(
            "date",
            "asset",
            vec![(d(1), "A".into()), (d(2), "A".into())],
        )
        .unwrap();
        assert!(axis.drop_level(0).is_err());
        let by_date = axis.drop_level(1).unwrap();
        assert_eq!(by_date.names(), &["date".to_string()]);
        assert_eq!(by_date.position(&Key::single(d(2))), Some(1));
    }

    #[test]
    fn argsort_orders_by_key() {
        let axis = Axis::single("date", vec![d(3), d(1), d(2)]).unwrap();
        assert_eq!(axis.argsort(), vec![1, 2, 0]);
    }
}
