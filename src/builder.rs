//! Graph Builder.
//!
//! Discovers a bounded family subgraph around an anchor person by issuing
//! relationship lookups against a [`FamilyDataSource`]. Traversal is an
//! explicit breadth-first work queue; generations are assigned at first
//! insert and never change within a build (the dedup guard in
//! [`FamilyGraph::insert_person`] is the cycle/diamond protection).
//!
//! Lookup failures degrade to "relationship unknown" and the build continues;
//! the only way a build fails is being superseded by a newer one.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::model::{FamilyGraph, ParentLink, Person, PersonId, birth_order_key};
use crate::service::FamilyDataSource;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("build superseded by a newer one")]
    Superseded,
}

/// Version token for one build. The engine bumps the shared epoch on every
/// rebuild; a builder holding an older token aborts at its next suspension
/// point, so results of a stale build can never reach the new tables.
#[derive(Debug, Clone)]
pub struct BuildGuard {
    epoch: Arc<AtomicU64>,
    token: u64,
}

impl BuildGuard {
    pub fn new(epoch: Arc<AtomicU64>, token: u64) -> Self {
        Self { epoch, token }
    }

    /// Guard for a one-off build that nothing can supersede.
    pub fn detached() -> Self {
        Self {
            epoch: Arc::new(AtomicU64::new(0)),
            token: 0,
        }
    }

    pub fn is_current(&self) -> bool {
        self.epoch.load(Ordering::SeqCst) == self.token
    }
}

pub struct GraphBuilder<'a> {
    source: &'a dyn FamilyDataSource,
    guard: BuildGuard,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(source: &'a dyn FamilyDataSource, guard: BuildGuard) -> Self {
        Self { source, guard }
    }

    /// Builds the person, parent-link, partner-link, and sibling tables for
    /// the given anchor and depth bounds. An anchor without a record yields
    /// an empty graph.
    pub async fn build(
        &self,
        anchor: PersonId,
        parent_depth: u32,
        child_depth: u32,
    ) -> Result<FamilyGraph, BuildError> {
        let mut graph = FamilyGraph::new();

        let Some(anchor_record) = self.details(anchor).await? else {
            warn!(person = %anchor, "anchor has no record, skipping build");
            return Ok(graph);
        };
        graph.insert_person(anchor_record, 0);

        self.discover_anchor_partners(&mut graph, anchor).await?;
        self.discover_siblings(&mut graph, anchor).await?;
        self.traverse_upward(&mut graph, anchor, parent_depth).await?;
        self.traverse_downward(&mut graph, anchor, child_depth)
            .await?;

        debug!(
            persons = graph.len(),
            siblings = graph.siblings.len(),
            "family graph built"
        );
        Ok(graph)
    }

    /// Generation-0 partner discovery for the anchor itself, so the anchor's
    /// couple can be laid out even when no descendants are requested.
    async fn discover_anchor_partners(
        &self,
        graph: &mut FamilyGraph,
        anchor: PersonId,
    ) -> Result<(), BuildError> {
        for partner in self.partners(anchor).await? {
            let partner_id = partner.id;
            graph.insert_person(partner, 0);
            graph.link_partners(anchor, partner_id);
        }
        Ok(())
    }

    /// Generation-0 sibling discovery: the union of the anchor's parents'
    /// children, minus the anchor, ordered oldest to youngest. Each sibling
    /// carries the anchor's parent pair as its parent link and brings its own
    /// partners into generation 0.
    async fn discover_siblings(
        &self,
        graph: &mut FamilyGraph,
        anchor: PersonId,
    ) -> Result<(), BuildError> {
        let father = self.father(anchor).await?;
        let mother = self.mother(anchor).await?;
        if father.is_none() && mother.is_none() {
            return Ok(());
        }
        let link = ParentLink { father, mother };
        graph.set_parents(anchor, link);

        let mut candidates: Vec<Person> = Vec::new();
        for parent in [father, mother].into_iter().flatten() {
            for child in self.children(parent).await? {
                if child.id != anchor && candidates.iter().all(|c| c.id != child.id) {
                    candidates.push(child);
                }
            }
        }
        candidates.sort_by_key(birth_order_key);

        for sibling in candidates {
            let sibling_id = sibling.id;
            if !graph.insert_person(sibling, 0) {
                continue;
            }
            graph.siblings.push(sibling_id);
            graph.set_parents(sibling_id, link);
            for partner in self.partners(sibling_id).await? {
                let partner_id = partner.id;
                graph.insert_person(partner, 0);
                graph.link_partners(sibling_id, partner_id);
            }
        }
        Ok(())
    }

    async fn traverse_upward(
        &self,
        graph: &mut FamilyGraph,
        anchor: PersonId,
        parent_depth: u32,
    ) -> Result<(), BuildError> {
        let mut queue: VecDeque<(PersonId, u32)> = VecDeque::new();
        queue.push_back((anchor, 0));

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= parent_depth {
                continue;
            }
            let father = self.father(current).await?;
            let mother = self.mother(current).await?;
            if father.is_none() && mother.is_none() {
                continue;
            }
            graph.set_parents(current, ParentLink { father, mother });
            for parent in [father, mother].into_iter().flatten() {
                if self.add_by_id(graph, parent, depth as i32 + 1).await? {
                    queue.push_back((parent, depth + 1));
                }
            }
            // Co-parents read as a couple even without a partner record.
            if let (Some(f), Some(m)) = (father, mother) {
                graph.link_partners(f, m);
            }
        }
        Ok(())
    }

    async fn traverse_downward(
        &self,
        graph: &mut FamilyGraph,
        anchor: PersonId,
        child_depth: u32,
    ) -> Result<(), BuildError> {
        let mut queue: VecDeque<(PersonId, u32)> = VecDeque::new();
        queue.push_back((anchor, 0));

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= child_depth {
                continue;
            }
            for child in self.children(current).await? {
                let child_id = child.id;
                let child_generation = -(depth as i32) - 1;
                if !graph.insert_person(child, child_generation) {
                    continue;
                }
                // Provisional link until the true parents are fetched.
                graph.set_parents(child_id, ParentLink::default());

                // The child may descend from a partner outside the anchor's
                // direct line, so look up its actual parents.
                let father = self.father(child_id).await?;
                let mother = self.mother(child_id).await?;
                if father.is_some() || mother.is_some() {
                    graph.set_parents(child_id, ParentLink { father, mother });
                    for parent in [father, mother].into_iter().flatten() {
                        self.add_by_id(graph, parent, child_generation + 1).await?;
                    }
                    if let (Some(f), Some(m)) = (father, mother) {
                        graph.link_partners(f, m);
                    }
                }
                queue.push_back((child_id, depth + 1));
            }
        }
        Ok(())
    }

    /// Fetches and inserts a person unless already discovered. Returns true
    /// only when the person was newly added.
    async fn add_by_id(
        &self,
        graph: &mut FamilyGraph,
        id: PersonId,
        generation: i32,
    ) -> Result<bool, BuildError> {
        if graph.contains(id) {
            return Ok(false);
        }
        let Some(record) = self.details(id).await? else {
            return Ok(false);
        };
        Ok(graph.insert_person(record, generation))
    }

    fn ensure_current(&self) -> Result<(), BuildError> {
        if self.guard.is_current() {
            Ok(())
        } else {
            Err(BuildError::Superseded)
        }
    }

    // Degrading lookups: any service failure becomes "relationship unknown".
    // Each one is a suspension point, so the guard is re-checked after it.

    async fn details(&self, id: PersonId) -> Result<Option<Person>, BuildError> {
        let result = self.source.person_details(id).await;
        self.ensure_current()?;
        Ok(result.unwrap_or_else(|err| {
            warn!(person = %id, error = %err, "person lookup failed");
            None
        }))
    }

    async fn father(&self, child: PersonId) -> Result<Option<PersonId>, BuildError> {
        let result = self.source.father_of(child).await;
        self.ensure_current()?;
        Ok(result.unwrap_or_else(|err| {
            warn!(child = %child, error = %err, "father lookup failed");
            None
        }))
    }

    async fn mother(&self, child: PersonId) -> Result<Option<PersonId>, BuildError> {
        let result = self.source.mother_of(child).await;
        self.ensure_current()?;
        Ok(result.unwrap_or_else(|err| {
            warn!(child = %child, error = %err, "mother lookup failed");
            None
        }))
    }

    async fn children(&self, parent: PersonId) -> Result<Vec<Person>, BuildError> {
        let result = self.source.children_of(parent).await;
        self.ensure_current()?;
        Ok(result.unwrap_or_else(|err| {
            warn!(parent = %parent, error = %err, "children lookup failed");
            Vec::new()
        }))
    }

    async fn partners(&self, person: PersonId) -> Result<Vec<Person>, BuildError> {
        let result = self.source.partners_of(person).await;
        self.ensure_current()?;
        Ok(result.unwrap_or_else(|err| {
            warn!(person = %person, error = %err, "partners lookup failed");
            Vec::new()
        }))
    }
}
