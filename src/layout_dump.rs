use crate::config::LayoutConfig;
use crate::connections::{Connection, derive_connections};
use crate::layout::TreeLayout;
use crate::model::FamilyGraph;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct TreeDump {
    pub width: f32,
    pub height: f32,
    pub persons: Vec<PersonDump>,
    pub connections: Vec<ConnectionDump>,
}

#[derive(Debug, Serialize)]
pub struct PersonDump {
    pub id: u64,
    pub given_name: String,
    pub family_name: String,
    pub sex: String,
    pub generation: i32,
    pub date_of_birth: Option<String>,
    pub date_of_death: Option<String>,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Serialize)]
pub struct ConnectionDump {
    pub kind: String,
    pub from: u64,
    pub to: u64,
    pub start: [f32; 2],
    pub end: [f32; 2],
}

impl TreeDump {
    pub fn from_tree(graph: &FamilyGraph, layout: &TreeLayout, config: &LayoutConfig) -> Self {
        let persons = graph
            .order
            .iter()
            .filter_map(|id| {
                let person = graph.persons.get(id)?;
                let position = layout.positions.get(id)?;
                Some(PersonDump {
                    id: person.id.0,
                    given_name: person.given_name.clone(),
                    family_name: person.family_name.clone(),
                    sex: format!("{:?}", person.sex),
                    generation: person.generation,
                    date_of_birth: person.date_of_birth.map(|d| d.to_string()),
                    date_of_death: person.date_of_death.map(|d| d.to_string()),
                    x: position.x,
                    y: position.y,
                })
            })
            .collect();

        let connections = derive_connections(graph, layout, config)
            .iter()
            .map(ConnectionDump::from_connection)
            .collect();

        TreeDump {
            width: layout.width,
            height: layout.height,
            persons,
            connections,
        }
    }
}

impl ConnectionDump {
    fn from_connection(connection: &Connection) -> Self {
        ConnectionDump {
            kind: format!("{:?}", connection.kind),
            from: connection.from.0,
            to: connection.to.0,
            start: [connection.start.0, connection.start.1],
            end: [connection.end.0, connection.end.1],
        }
    }
}

pub fn write_tree_dump(
    path: &Path,
    graph: &FamilyGraph,
    layout: &TreeLayout,
    config: &LayoutConfig,
) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = TreeDump::from_tree(graph, layout, config);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
