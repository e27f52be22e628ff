use std::sync::Arc;

use chrono::NaiveDate;
use stamboom::layout_dump::TreeDump;
use stamboom::{
    BuildGuard, FamilyDataSource, GraphBuilder, InMemoryFamily, LayoutConfig, Person, PersonId,
    Sex, TreeEngine, compute_tree_layout, derive_connections,
};

fn person(id: u64, name: &str, sex: Sex, born: Option<(i32, u32, u32)>) -> Person {
    Person {
        id: PersonId(id),
        given_name: name.to_string(),
        family_name: "van Dijk".to_string(),
        date_of_birth: born.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
        date_of_death: None,
        place_of_birth: None,
        place_of_death: None,
        sex,
        generation: 0,
    }
}

/// Three generations around anchor 1: parents 2/3, maternal grandparents 4/5,
/// partner 6, siblings 7 (older) and 8 (younger), children 9/10.
fn extended_family() -> InMemoryFamily {
    let source = InMemoryFamily::new();
    source.seed_person(person(1, "Anchor", Sex::Male, Some((1990, 6, 15))));
    source.seed_person(person(2, "Father", Sex::Male, Some((1960, 2, 1))));
    source.seed_person(person(3, "Mother", Sex::Female, Some((1963, 9, 9))));
    source.seed_person(person(4, "Grandfather", Sex::Male, Some((1935, 1, 1))));
    source.seed_person(person(5, "Grandmother", Sex::Female, Some((1938, 5, 5))));
    source.seed_person(person(6, "Partner", Sex::Female, Some((1991, 3, 3))));
    source.seed_person(person(7, "OlderSib", Sex::Female, Some((1987, 7, 7))));
    source.seed_person(person(8, "YoungerSib", Sex::Male, Some((1994, 4, 4))));
    source.seed_person(person(9, "FirstChild", Sex::Female, Some((2016, 1, 1))));
    source.seed_person(person(10, "SecondChild", Sex::Male, Some((2019, 8, 8))));
    source.seed_parents(PersonId(1), Some(PersonId(2)), Some(PersonId(3)));
    source.seed_parents(PersonId(7), Some(PersonId(2)), Some(PersonId(3)));
    source.seed_parents(PersonId(8), Some(PersonId(2)), Some(PersonId(3)));
    source.seed_parents(PersonId(3), Some(PersonId(4)), Some(PersonId(5)));
    source.seed_parents(PersonId(9), Some(PersonId(1)), Some(PersonId(6)));
    source.seed_parents(PersonId(10), Some(PersonId(1)), Some(PersonId(6)));
    source.seed_partners(PersonId(1), PersonId(6));
    source
}

#[tokio::test]
async fn one_up_zero_down_is_anchor_and_parents() {
    let source = extended_family();
    let builder = GraphBuilder::new(&source, BuildGuard::detached());
    let graph = builder.build(PersonId(1), 1, 0).await.unwrap();

    assert!(graph.contains(PersonId(1)));
    assert!(graph.contains(PersonId(2)));
    assert!(graph.contains(PersonId(3)));
    assert!(!graph.contains(PersonId(4)));
    assert!(!graph.contains(PersonId(9)));
    assert_eq!(graph.generation_of(PersonId(2)), Some(1));
    assert_eq!(graph.generation_of(PersonId(3)), Some(1));
}

#[tokio::test]
async fn descendants_and_co_parents_land_in_their_generations() {
    let source = extended_family();
    let builder = GraphBuilder::new(&source, BuildGuard::detached());
    let graph = builder.build(PersonId(1), 0, 1).await.unwrap();

    assert_eq!(graph.generation_of(PersonId(9)), Some(-1));
    assert_eq!(graph.generation_of(PersonId(10)), Some(-1));
    assert_eq!(graph.generation_of(PersonId(6)), Some(0));
    assert!(graph.partners_of(PersonId(1)).contains(&PersonId(6)));
}

#[tokio::test]
async fn partner_edges_are_symmetric_in_a_full_build() {
    let source = extended_family();
    let builder = GraphBuilder::new(&source, BuildGuard::detached());
    let graph = builder.build(PersonId(1), 2, 2).await.unwrap();

    for (person, partners) in &graph.partners {
        for partner in partners {
            assert!(
                graph.partners_of(*partner).contains(person),
                "partner edge {person} -> {partner} has no reverse edge"
            );
        }
    }
}

#[tokio::test]
async fn anchor_row_orders_siblings_around_the_couple() {
    let source = extended_family();
    let builder = GraphBuilder::new(&source, BuildGuard::detached());
    let graph = builder.build(PersonId(1), 1, 0).await.unwrap();
    let config = LayoutConfig::default();
    let layout = compute_tree_layout(&graph, PersonId(1), &config);

    let anchor = layout.positions[&PersonId(1)];
    let partner = layout.positions[&PersonId(6)];
    let older = layout.positions[&PersonId(7)];
    let younger = layout.positions[&PersonId(8)];

    // Male anchor left of female partner, shapes touching.
    assert_eq!(partner.x - anchor.x, config.shape_width);
    assert!(older.x > partner.x);
    assert!(younger.x < anchor.x);
    assert_eq!(anchor.y, older.y);
    assert_eq!(anchor.y, younger.y);
}

#[tokio::test]
async fn parents_sit_one_row_above_the_anchor() {
    let source = extended_family();
    let builder = GraphBuilder::new(&source, BuildGuard::detached());
    let graph = builder.build(PersonId(1), 2, 1).await.unwrap();
    let config = LayoutConfig::default();
    let layout = compute_tree_layout(&graph, PersonId(1), &config);

    let grandparent_y = layout.positions[&PersonId(4)].y;
    let parent_y = layout.positions[&PersonId(2)].y;
    let anchor_y = layout.positions[&PersonId(1)].y;
    let child_y = layout.positions[&PersonId(9)].y;

    assert_eq!(grandparent_y, config.top_margin);
    assert_eq!(parent_y - grandparent_y, config.vertical_gap);
    assert_eq!(anchor_y - parent_y, config.vertical_gap);
    assert_eq!(child_y - anchor_y, config.vertical_gap);
}

#[tokio::test]
async fn every_shape_stays_inside_the_canvas() {
    let source = extended_family();
    let builder = GraphBuilder::new(&source, BuildGuard::detached());
    let graph = builder.build(PersonId(1), 2, 2).await.unwrap();
    let config = LayoutConfig::default();
    let layout = compute_tree_layout(&graph, PersonId(1), &config);

    assert!(layout.width >= config.min_canvas_width);
    assert!(layout.height >= config.min_canvas_height);
    for position in layout.positions.values() {
        assert!(position.x - config.shape_width / 2.0 >= config.canvas_padding - 1e-3);
        assert!(position.x + config.shape_width / 2.0 <= layout.width - config.canvas_padding + 1e-3);
        assert!(position.y >= config.top_margin - 1e-3);
        assert!(
            position.y + config.shape_height <= layout.height - config.canvas_padding + 1e-3
        );
    }
}

#[tokio::test]
async fn connections_link_placed_persons_only() {
    let source = extended_family();
    let builder = GraphBuilder::new(&source, BuildGuard::detached());
    let graph = builder.build(PersonId(1), 1, 1).await.unwrap();
    let config = LayoutConfig::default();
    let layout = compute_tree_layout(&graph, PersonId(1), &config);

    let connections = derive_connections(&graph, &layout, &config);
    assert!(!connections.is_empty());
    for connection in &connections {
        assert!(layout.positions.contains_key(&connection.from));
        assert!(layout.positions.contains_key(&connection.to));
    }
}

#[tokio::test]
async fn dragging_the_anchor_carries_the_partner_only() {
    let source = extended_family();
    let mut engine = TreeEngine::new(Arc::new(source), LayoutConfig::default());
    engine.rebuild(Some(PersonId(1)), 1, 1).await.unwrap();

    let partner_before = engine.positions()[&PersonId(6)];
    let sibling_before = engine.positions()[&PersonId(7)];
    let anchor_before = engine.positions()[&PersonId(1)];

    assert!(engine.move_person(PersonId(1), anchor_before.x + 55.0, anchor_before.y + 20.0));

    let partner_after = engine.positions()[&PersonId(6)];
    let sibling_after = engine.positions()[&PersonId(7)];
    assert_eq!(partner_after.x - partner_before.x, 55.0);
    assert_eq!(partner_after.y - partner_before.y, 20.0);
    assert_eq!(sibling_after, sibling_before);
}

#[tokio::test]
async fn rebuild_replaces_the_previous_tree() {
    let source = extended_family();
    let mut engine = TreeEngine::new(Arc::new(source), LayoutConfig::default());

    engine.rebuild(Some(PersonId(1)), 0, 0).await.unwrap();
    let first_count = engine.graph().len();

    engine.rebuild(Some(PersonId(4)), 0, 1).await.unwrap();
    assert!(engine.graph().contains(PersonId(4)));
    assert!(!engine.graph().contains(PersonId(8)));
    assert_ne!(engine.graph().len(), first_count);
}

#[tokio::test]
async fn search_matches_either_name_part() {
    let source = extended_family();
    let hits = source.persons_matching("grand").await.unwrap();
    assert_eq!(hits.len(), 2);
    let by_family = source.persons_matching("van dijk").await.unwrap();
    assert_eq!(by_family.len(), 10);
    assert!(source.persons_matching("  ").await.unwrap().is_empty());
}

#[tokio::test]
async fn tree_dump_carries_positions_and_connections() {
    let source = extended_family();
    let builder = GraphBuilder::new(&source, BuildGuard::detached());
    let graph = builder.build(PersonId(1), 1, 0).await.unwrap();
    let config = LayoutConfig::default();
    let layout = compute_tree_layout(&graph, PersonId(1), &config);

    let dump = TreeDump::from_tree(&graph, &layout, &config);
    let value = serde_json::to_value(&dump).unwrap();

    assert_eq!(value["width"], layout.width);
    assert_eq!(
        value["persons"].as_array().unwrap().len(),
        layout.positions.len()
    );
    let first = &value["persons"][0];
    assert!(first["id"].is_u64());
    assert!(first["x"].is_number());
    assert!(!value["connections"].as_array().unwrap().is_empty());
}
