//! Coordinate Layout Engine.
//!
//! Turns the generation-partitioned person set into non-overlapping 2D
//! positions: generation rows top-down (most ancestral on top), couples as a
//! single two-slot unit with touching edges, and the anchor generation laid
//! out around the center line with older siblings to the right and younger
//! ones to the left.
//!
//! A position's `x` is the shape's horizontal center and `y` its top edge.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::config::LayoutConfig;
use crate::model::{FamilyGraph, PersonId, Sex, birth_order_key};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Default)]
pub struct TreeLayout {
    pub positions: BTreeMap<PersonId, Position>,
    pub width: f32,
    pub height: f32,
}

/// One horizontal slot: a person and the in-generation partner sharing it.
type Unit = (PersonId, Option<PersonId>);

pub fn compute_tree_layout(
    graph: &FamilyGraph,
    anchor: PersonId,
    config: &LayoutConfig,
) -> TreeLayout {
    let mut positions: BTreeMap<PersonId, Position> = BTreeMap::new();
    let groups = graph.generations();
    if groups.is_empty() {
        return finish(positions, config);
    }
    let max_generation = graph.max_generation();

    // Most ancestral generation first, each one a fixed step further down.
    for (generation, members) in groups.iter().rev() {
        let y = config.top_margin
            + (max_generation - generation) as f32 * config.vertical_gap;
        if *generation == 0 && !graph.siblings.is_empty() && members.contains(&anchor) {
            place_anchor_row(graph, anchor, members, y, config, &mut positions);
        } else {
            place_centered_row(graph, members, y, config, &mut positions);
        }
    }

    finish(positions, config)
}

/// Pairs row members into units in discovery order. A person's first
/// unclaimed partner within the same row shares their unit.
fn pair_units(graph: &FamilyGraph, members: &[PersonId]) -> Vec<Unit> {
    let mut claimed: HashSet<PersonId> = HashSet::new();
    let mut units = Vec::new();
    for &id in members {
        if claimed.contains(&id) {
            continue;
        }
        claimed.insert(id);
        let partner = graph
            .partners_of(id)
            .iter()
            .copied()
            .find(|p| members.contains(p) && !claimed.contains(p));
        if let Some(partner) = partner {
            claimed.insert(partner);
        }
        units.push((id, partner));
    }
    units
}

/// Male left, female right; encounter order when sex does not decide.
fn order_couple(graph: &FamilyGraph, a: PersonId, b: PersonId) -> (PersonId, PersonId) {
    let sex_of = |id: PersonId| graph.persons.get(&id).map_or(Sex::Unknown, |p| p.sex);
    match (sex_of(a), sex_of(b)) {
        (Sex::Female, Sex::Male) | (Sex::Female, Sex::Unknown) | (Sex::Unknown, Sex::Male) => {
            (b, a)
        }
        _ => (a, b),
    }
}

fn unit_width(unit: &Unit, config: &LayoutConfig) -> f32 {
    if unit.1.is_some() {
        config.shape_width * 2.0
    } else {
        config.shape_width
    }
}

/// Places one unit with its left edge at `left`; couple shapes touch so the
/// pair reads as a single visual block. Returns the width consumed.
fn place_unit(
    graph: &FamilyGraph,
    unit: &Unit,
    left: f32,
    y: f32,
    config: &LayoutConfig,
    positions: &mut BTreeMap<PersonId, Position>,
) -> f32 {
    let w = config.shape_width;
    match unit.1 {
        None => {
            positions.insert(unit.0, Position { x: left + w * 0.5, y });
            w
        }
        Some(partner) => {
            let (left_person, right_person) = order_couple(graph, unit.0, partner);
            positions.insert(left_person, Position { x: left + w * 0.5, y });
            positions.insert(right_person, Position { x: left + w * 1.5, y });
            w * 2.0
        }
    }
}

/// Lays a row out left-to-right in discovery order, centered as a group on
/// the configured center line.
fn place_centered_row(
    graph: &FamilyGraph,
    members: &[PersonId],
    y: f32,
    config: &LayoutConfig,
    positions: &mut BTreeMap<PersonId, Position>,
) {
    let units = pair_units(graph, members);
    if units.is_empty() {
        return;
    }
    let slot_gap = config.horizontal_gap - config.shape_width;
    let total: f32 = units.iter().map(|u| unit_width(u, config)).sum::<f32>()
        + (units.len() - 1) as f32 * slot_gap;

    let mut left = config.center_x - total / 2.0;
    for unit in &units {
        let consumed = place_unit(graph, unit, left, y, config, positions);
        left += consumed + slot_gap;
    }
}

/// Generation 0 with siblings: anchor couple on the center line, older
/// siblings walking right in birth order, younger siblings walking left with
/// the youngest nearest the center. Remaining generation-0 members (e.g.
/// co-parents discovered through descendants) continue to the right.
fn place_anchor_row(
    graph: &FamilyGraph,
    anchor: PersonId,
    members: &[PersonId],
    y: f32,
    config: &LayoutConfig,
    positions: &mut BTreeMap<PersonId, Position>,
) {
    let w = config.shape_width;
    let slot_gap = config.horizontal_gap - w;
    let mut claimed: HashSet<PersonId> = HashSet::new();

    let partner_for = |id: PersonId, claimed: &HashSet<PersonId>| {
        graph
            .partners_of(id)
            .iter()
            .copied()
            .find(|p| members.contains(p) && !claimed.contains(p) && *p != id)
    };

    // Anchor unit, centered.
    claimed.insert(anchor);
    let anchor_partner = partner_for(anchor, &claimed);
    if let Some(p) = anchor_partner {
        claimed.insert(p);
    }
    let anchor_unit: Unit = (anchor, anchor_partner);
    let anchor_width = unit_width(&anchor_unit, config);
    let anchor_left = config.center_x - anchor_width / 2.0;
    place_unit(graph, &anchor_unit, anchor_left, y, config, positions);

    // Siblings split by age relative to the anchor; the sibling list is
    // already oldest to youngest.
    let anchor_key = graph.persons.get(&anchor).map(birth_order_key);
    let mut older: Vec<PersonId> = Vec::new();
    let mut younger: Vec<PersonId> = Vec::new();
    for &sibling in &graph.siblings {
        let is_older = match (&anchor_key, graph.persons.get(&sibling)) {
            (Some(key), Some(person)) => birth_order_key(person) < *key,
            _ => false,
        };
        if is_older {
            older.push(sibling);
        } else {
            younger.push(sibling);
        }
    }

    // Rightward walk: older siblings in birth order.
    let mut right_cursor = anchor_left + anchor_width + slot_gap;
    for sibling in older {
        if claimed.contains(&sibling) {
            continue;
        }
        claimed.insert(sibling);
        let partner = partner_for(sibling, &claimed);
        if let Some(p) = partner {
            claimed.insert(p);
        }
        let consumed = place_unit(graph, &(sibling, partner), right_cursor, y, config, positions);
        right_cursor += consumed + slot_gap;
    }

    // Leftward walk: youngest sibling nearest the center.
    let mut left_cursor = anchor_left - slot_gap;
    for sibling in younger.into_iter().rev() {
        if claimed.contains(&sibling) {
            continue;
        }
        claimed.insert(sibling);
        let partner = partner_for(sibling, &claimed);
        if let Some(p) = partner {
            claimed.insert(p);
        }
        let unit: Unit = (sibling, partner);
        let width = unit_width(&unit, config);
        place_unit(graph, &unit, left_cursor - width, y, config, positions);
        left_cursor -= width + slot_gap;
    }

    // Anyone else in this generation continues the rightward walk.
    for &id in members {
        if claimed.contains(&id) {
            continue;
        }
        claimed.insert(id);
        let partner = partner_for(id, &claimed);
        if let Some(p) = partner {
            claimed.insert(p);
        }
        let consumed = place_unit(graph, &(id, partner), right_cursor, y, config, positions);
        right_cursor += consumed + slot_gap;
    }
}

/// Shifts a too-far-left layout back inside the canvas, then derives the
/// extent: bounding box plus padding, floored at the minimum canvas size.
fn finish(mut positions: BTreeMap<PersonId, Position>, config: &LayoutConfig) -> TreeLayout {
    if positions.is_empty() {
        return TreeLayout {
            positions,
            width: config.min_canvas_width,
            height: config.min_canvas_height,
        };
    }

    let half = config.shape_width / 2.0;
    let min_left = positions
        .values()
        .map(|p| p.x - half)
        .fold(f32::INFINITY, f32::min);
    if min_left < config.canvas_padding {
        let shift = config.canvas_padding - min_left;
        for position in positions.values_mut() {
            position.x += shift;
        }
    }

    let max_right = positions
        .values()
        .map(|p| p.x + half)
        .fold(f32::NEG_INFINITY, f32::max);
    let max_bottom = positions
        .values()
        .map(|p| p.y + config.shape_height)
        .fold(f32::NEG_INFINITY, f32::max);

    TreeLayout {
        width: (max_right + config.canvas_padding).max(config.min_canvas_width),
        height: (max_bottom + config.canvas_padding).max(config.min_canvas_height),
        positions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Person;
    use chrono::NaiveDate;

    fn person(id: u64, sex: Sex, born: Option<(i32, u32, u32)>) -> Person {
        Person {
            id: PersonId(id),
            given_name: format!("P{id}"),
            family_name: "Test".to_string(),
            date_of_birth: born.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            date_of_death: None,
            place_of_birth: None,
            place_of_death: None,
            sex,
            generation: 0,
        }
    }

    #[test]
    fn lone_anchor_gets_minimum_canvas() {
        let mut graph = FamilyGraph::new();
        graph.insert_person(person(1, Sex::Unknown, None), 0);
        let config = LayoutConfig::default();
        let layout = compute_tree_layout(&graph, PersonId(1), &config);

        assert_eq!(layout.width, config.min_canvas_width);
        assert_eq!(layout.height, config.min_canvas_height);
        let pos = layout.positions[&PersonId(1)];
        assert!(pos.x - config.shape_width / 2.0 >= config.canvas_padding);
    }

    #[test]
    fn couple_is_adjacent_with_male_left() {
        let mut graph = FamilyGraph::new();
        // Female encountered first; sex ordering must still put the male left.
        graph.insert_person(person(2, Sex::Female, None), 1);
        graph.insert_person(person(1, Sex::Male, None), 1);
        graph.link_partners(PersonId(2), PersonId(1));
        let config = LayoutConfig::default();
        let layout = compute_tree_layout(&graph, PersonId(1), &config);

        let male = layout.positions[&PersonId(1)];
        let female = layout.positions[&PersonId(2)];
        assert_eq!(male.y, female.y);
        assert_eq!(female.x - male.x, config.shape_width);
    }

    #[test]
    fn generations_stack_top_down() {
        let mut graph = FamilyGraph::new();
        graph.insert_person(person(1, Sex::Male, None), 0);
        graph.insert_person(person(2, Sex::Male, None), 1);
        graph.insert_person(person(3, Sex::Female, None), -1);
        let config = LayoutConfig::default();
        let layout = compute_tree_layout(&graph, PersonId(1), &config);

        let ancestor_y = layout.positions[&PersonId(2)].y;
        let anchor_y = layout.positions[&PersonId(1)].y;
        let descendant_y = layout.positions[&PersonId(3)].y;
        assert_eq!(ancestor_y, config.top_margin);
        assert_eq!(anchor_y - ancestor_y, config.vertical_gap);
        assert_eq!(descendant_y - anchor_y, config.vertical_gap);
    }

    #[test]
    fn anchor_row_puts_older_right_younger_left() {
        let mut graph = FamilyGraph::new();
        graph.insert_person(person(1, Sex::Male, Some((1990, 1, 1))), 0);
        graph.insert_person(person(2, Sex::Female, Some((1985, 1, 1))), 0); // older
        graph.insert_person(person(3, Sex::Male, Some((1995, 1, 1))), 0); // younger
        graph.siblings = vec![PersonId(2), PersonId(3)];
        let config = LayoutConfig::default();
        let layout = compute_tree_layout(&graph, PersonId(1), &config);

        let anchor = layout.positions[&PersonId(1)];
        let older = layout.positions[&PersonId(2)];
        let younger = layout.positions[&PersonId(3)];
        assert!(older.x > anchor.x);
        assert!(younger.x < anchor.x);
        assert_eq!(anchor.y, older.y);
        assert_eq!(anchor.y, younger.y);
    }

    #[test]
    fn sibling_partner_stays_adjacent_in_anchor_row() {
        let mut graph = FamilyGraph::new();
        graph.insert_person(person(1, Sex::Female, Some((1990, 1, 1))), 0);
        graph.insert_person(person(2, Sex::Male, Some((1988, 1, 1))), 0);
        graph.insert_person(person(3, Sex::Female, None), 0);
        graph.siblings = vec![PersonId(2)];
        graph.link_partners(PersonId(2), PersonId(3));
        let config = LayoutConfig::default();
        let layout = compute_tree_layout(&graph, PersonId(1), &config);

        let sibling = layout.positions[&PersonId(2)];
        let partner = layout.positions[&PersonId(3)];
        assert_eq!(partner.x - sibling.x, config.shape_width);
        assert_eq!(partner.y, sibling.y);
    }

    #[test]
    fn wide_generation_stays_inside_canvas() {
        let mut graph = FamilyGraph::new();
        graph.insert_person(person(100, Sex::Male, None), 0);
        for id in 1..=12 {
            graph.insert_person(person(id, Sex::Unknown, None), 1);
        }
        let config = LayoutConfig::default();
        let layout = compute_tree_layout(&graph, PersonId(100), &config);

        for position in layout.positions.values() {
            let left = position.x - config.shape_width / 2.0;
            let right = position.x + config.shape_width / 2.0;
            assert!(left >= config.canvas_padding - 1e-3);
            assert!(right <= layout.width - config.canvas_padding + 1e-3);
            assert!(position.y + config.shape_height <= layout.height - config.canvas_padding + 1e-3);
        }
    }

    #[test]
    fn unknown_sex_couple_keeps_encounter_order() {
        let mut graph = FamilyGraph::new();
        graph.insert_person(person(5, Sex::Unknown, None), 0);
        graph.insert_person(person(6, Sex::Unknown, None), 0);
        graph.link_partners(PersonId(5), PersonId(6));
        let config = LayoutConfig::default();
        let layout = compute_tree_layout(&graph, PersonId(5), &config);

        let first = layout.positions[&PersonId(5)];
        let second = layout.positions[&PersonId(6)];
        assert_eq!(second.x - first.x, config.shape_width);
    }
}
