//! Tree engine: owns the current build's tables and position map.
//!
//! One `TreeState` exists per build and is replaced wholesale by `rebuild`;
//! edit/delete/add flows in the surrounding UI are expected to call `rebuild`
//! afterwards rather than patch the tables. `rebuild` takes `&mut self`, so
//! a drag can never interleave with an in-progress build on the same handle;
//! builds superseded by a newer epoch are discarded before commit.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::builder::{BuildError, BuildGuard, GraphBuilder};
use crate::config::LayoutConfig;
use crate::connections::{Connection, derive_connections};
use crate::layout::{Position, TreeLayout, compute_tree_layout};
use crate::model::{FamilyGraph, PersonId};
use crate::service::FamilyDataSource;

#[derive(Debug, Clone, Default)]
pub struct TreeState {
    pub anchor: Option<PersonId>,
    pub parent_depth: u32,
    pub child_depth: u32,
    pub graph: FamilyGraph,
    pub layout: TreeLayout,
}

pub struct TreeEngine {
    source: Arc<dyn FamilyDataSource>,
    config: LayoutConfig,
    epoch: Arc<AtomicU64>,
    state: TreeState,
}

impl TreeEngine {
    pub fn new(source: Arc<dyn FamilyDataSource>, config: LayoutConfig) -> Self {
        let layout = compute_tree_layout(&FamilyGraph::new(), PersonId(0), &config);
        Self {
            source,
            config,
            epoch: Arc::new(AtomicU64::new(0)),
            state: TreeState {
                layout,
                ..TreeState::default()
            },
        }
    }

    /// Discards the current tree and builds a new one around `anchor`. A
    /// `None` anchor clears all tables. Any still-running older build is
    /// invalidated by the epoch bump and can never commit its results.
    pub async fn rebuild(
        &mut self,
        anchor: Option<PersonId>,
        parent_depth: u32,
        child_depth: u32,
    ) -> Result<(), BuildError> {
        let token = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let Some(anchor) = anchor else {
            self.state = TreeState {
                layout: compute_tree_layout(&FamilyGraph::new(), PersonId(0), &self.config),
                ..TreeState::default()
            };
            return Ok(());
        };

        let guard = BuildGuard::new(self.epoch.clone(), token);
        let builder = GraphBuilder::new(self.source.as_ref(), guard.clone());
        let graph = builder.build(anchor, parent_depth, child_depth).await?;
        if !guard.is_current() {
            return Err(BuildError::Superseded);
        }

        let layout = compute_tree_layout(&graph, anchor, &self.config);
        debug!(
            anchor = %anchor,
            persons = graph.len(),
            width = layout.width,
            height = layout.height,
            "tree rebuilt"
        );
        self.state = TreeState {
            anchor: Some(anchor),
            parent_depth,
            child_depth,
            graph,
            layout,
        };
        Ok(())
    }

    /// Drag coordinator: moves one person to the new coordinates and applies
    /// the same delta to every recorded partner, preserving couple adjacency.
    /// Returns false when the person has no position in the current build.
    pub fn move_person(&mut self, id: PersonId, x: f32, y: f32) -> bool {
        let Some(old) = self.state.layout.positions.get(&id).copied() else {
            return false;
        };
        let dx = x - old.x;
        let dy = y - old.y;
        self.state.layout.positions.insert(id, Position { x, y });
        let partners: Vec<PersonId> = self.state.graph.partners_of(id).to_vec();
        for partner in partners {
            if let Some(position) = self.state.layout.positions.get_mut(&partner) {
                position.x += dx;
                position.y += dy;
            }
        }
        true
    }

    pub fn state(&self) -> &TreeState {
        &self.state
    }

    pub fn graph(&self) -> &FamilyGraph {
        &self.state.graph
    }

    pub fn positions(&self) -> &BTreeMap<PersonId, Position> {
        &self.state.layout.positions
    }

    /// Current canvas extent as (width, height).
    pub fn canvas(&self) -> (f32, f32) {
        (self.state.layout.width, self.state.layout.height)
    }

    pub fn connections(&self) -> Vec<Connection> {
        derive_connections(&self.state.graph, &self.state.layout, &self.config)
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }
}
