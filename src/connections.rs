//! Derived connection segments for a rendering surface.
//!
//! Connections are computed from the link tables and the position map, never
//! stored: a father line runs from the father's bottom anchor to the child's
//! top-left corner, a mother line to the top-right corner, and a partner
//! line joins the two bottom anchors. Segments whose endpoints lack a
//! position are skipped, so a partially discovered tree still renders.

use serde::Serialize;

use crate::config::LayoutConfig;
use crate::layout::TreeLayout;
use crate::model::{FamilyGraph, PersonId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    Father,
    Mother,
    Partner,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Connection {
    pub kind: ConnectionKind,
    pub from: PersonId,
    pub to: PersonId,
    pub start: (f32, f32),
    pub end: (f32, f32),
}

pub fn derive_connections(
    graph: &FamilyGraph,
    layout: &TreeLayout,
    config: &LayoutConfig,
) -> Vec<Connection> {
    let mut connections = Vec::new();
    let half = config.shape_width / 2.0;
    let height = config.shape_height;

    for (child, link) in &graph.parents {
        let Some(child_pos) = layout.positions.get(child) else {
            continue;
        };
        if let Some(father) = link.father {
            if let Some(father_pos) = layout.positions.get(&father) {
                connections.push(Connection {
                    kind: ConnectionKind::Father,
                    from: father,
                    to: *child,
                    start: (father_pos.x, father_pos.y + height),
                    end: (child_pos.x - half, child_pos.y),
                });
            }
        }
        if let Some(mother) = link.mother {
            if let Some(mother_pos) = layout.positions.get(&mother) {
                connections.push(Connection {
                    kind: ConnectionKind::Mother,
                    from: mother,
                    to: *child,
                    start: (mother_pos.x, mother_pos.y + height),
                    end: (child_pos.x + half, child_pos.y),
                });
            }
        }
    }

    for (person, partners) in &graph.partners {
        let Some(person_pos) = layout.positions.get(person) else {
            continue;
        };
        for partner in partners {
            // Each symmetric pair is drawn once, lower id first.
            if person >= partner {
                continue;
            }
            let Some(partner_pos) = layout.positions.get(partner) else {
                continue;
            };
            connections.push(Connection {
                kind: ConnectionKind::Partner,
                from: *person,
                to: *partner,
                start: (person_pos.x, person_pos.y + height),
                end: (partner_pos.x, partner_pos.y + height),
            });
        }
    }

    connections
}
