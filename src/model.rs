use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Stable identifier assigned by the relationship service.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct PersonId(pub u64);

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Sex {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Sex {
    /// The middleware reports sex as a nullable boolean flag.
    pub fn from_flag(is_male: Option<bool>) -> Self {
        match is_male {
            Some(true) => Sex::Male,
            Some(false) => Sex::Female,
            None => Sex::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub given_name: String,
    pub family_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_death: Option<NaiveDate>,
    pub place_of_birth: Option<String>,
    pub place_of_death: Option<String>,
    pub sex: Sex,
    /// Offset from the anchor: positive = ancestors, negative = descendants.
    /// Assigned once, at first discovery.
    pub generation: i32,
}

/// At most one link per child; either parent may be unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParentLink {
    pub father: Option<PersonId>,
    pub mother: Option<PersonId>,
}

impl ParentLink {
    pub fn is_empty(&self) -> bool {
        self.father.is_none() && self.mother.is_none()
    }
}

/// The tables produced by one build: person records, parent links, partner
/// adjacency, and the anchor's ordered sibling list. Replaced wholesale on
/// every rebuild; drag operations never touch it.
#[derive(Debug, Clone, Default)]
pub struct FamilyGraph {
    pub persons: BTreeMap<PersonId, Person>,
    pub parents: BTreeMap<PersonId, ParentLink>,
    pub partners: BTreeMap<PersonId, Vec<PersonId>>,
    /// Anchor's siblings, oldest to youngest; unknown birth dates sort last.
    pub siblings: Vec<PersonId>,
    /// Discovery order, drives within-generation layout order.
    pub order: Vec<PersonId>,
}

impl FamilyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: PersonId) -> bool {
        self.persons.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    pub fn len(&self) -> usize {
        self.persons.len()
    }

    /// Adds a person at the given generation. Returns false (and changes
    /// nothing) if the id is already present: first discovery wins, which is
    /// the cycle/diamond guard for remarriages and multi-path ancestry.
    pub fn insert_person(&mut self, mut record: Person, generation: i32) -> bool {
        if self.persons.contains_key(&record.id) {
            return false;
        }
        record.generation = generation;
        self.order.push(record.id);
        self.persons.insert(record.id, record);
        true
    }

    /// Records a symmetric partner edge between two persons, deduplicated.
    pub fn link_partners(&mut self, a: PersonId, b: PersonId) {
        if a == b {
            return;
        }
        let fwd = self.partners.entry(a).or_default();
        if !fwd.contains(&b) {
            fwd.push(b);
        }
        let rev = self.partners.entry(b).or_default();
        if !rev.contains(&a) {
            rev.push(a);
        }
    }

    /// Sets the parent link for a child. Last write wins: a fetched link
    /// replaces a provisional empty one recorded during downward traversal.
    pub fn set_parents(&mut self, child: PersonId, link: ParentLink) {
        self.parents.insert(child, link);
    }

    pub fn partners_of(&self, id: PersonId) -> &[PersonId] {
        self.partners.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn generation_of(&self, id: PersonId) -> Option<i32> {
        self.persons.get(&id).map(|p| p.generation)
    }

    /// Persons grouped by generation, each group in discovery order.
    pub fn generations(&self) -> BTreeMap<i32, Vec<PersonId>> {
        let mut groups: BTreeMap<i32, Vec<PersonId>> = BTreeMap::new();
        for id in &self.order {
            if let Some(person) = self.persons.get(id) {
                groups.entry(person.generation).or_default().push(*id);
            }
        }
        groups
    }

    pub fn max_generation(&self) -> i32 {
        self.persons
            .values()
            .map(|p| p.generation)
            .max()
            .unwrap_or(0)
    }
}

/// Sort key for sibling ordering: birth date ascending, unknown dates last,
/// id as the tie breaker so the order is total.
pub fn birth_order_key(person: &Person) -> (bool, Option<NaiveDate>, PersonId) {
    (
        person.date_of_birth.is_none(),
        person.date_of_birth,
        person.id,
    )
}
