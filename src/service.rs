//! Relationship Data Port.
//!
//! `FamilyDataSource` is the async boundary between the tree engine and the
//! middleware that owns the genealogy records. `HttpFamilyService` speaks the
//! Familiez wire protocol; `InMemoryFamily` backs tests and demos.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::model::{ParentLink, Person, PersonId, Sex};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("operation rejected: {0}")]
    Rejected(String),
}

/// Person fields for create/update. Father/mother ids are only honored on
/// create; updates leave recorded parentage alone.
#[derive(Debug, Clone, Default)]
pub struct PersonDraft {
    pub given_name: String,
    pub family_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_death: Option<NaiveDate>,
    pub place_of_birth: Option<String>,
    pub place_of_death: Option<String>,
    pub sex: Sex,
    pub father: Option<PersonId>,
    pub mother: Option<PersonId>,
}

/// The relationship lookups and record commands the engine consumes.
///
/// "Not found" is `None`/empty, never an error; errors mean the transport or
/// the service itself failed. The builder degrades both to "relationship
/// unknown" and keeps going.
#[async_trait]
pub trait FamilyDataSource: Send + Sync {
    async fn person_details(&self, id: PersonId) -> Result<Option<Person>, ServiceError>;
    async fn father_of(&self, child: PersonId) -> Result<Option<PersonId>, ServiceError>;
    async fn mother_of(&self, child: PersonId) -> Result<Option<PersonId>, ServiceError>;
    async fn children_of(&self, parent: PersonId) -> Result<Vec<Person>, ServiceError>;
    async fn partners_of(&self, person: PersonId) -> Result<Vec<Person>, ServiceError>;
    async fn persons_matching(&self, text: &str) -> Result<Vec<Person>, ServiceError>;
    async fn create_person(&self, draft: &PersonDraft) -> Result<Person, ServiceError>;
    async fn update_person(&self, id: PersonId, draft: &PersonDraft) -> Result<(), ServiceError>;
    async fn delete_person(
        &self,
        id: PersonId,
        revision: Option<&str>,
    ) -> Result<(), ServiceError>;
}

// --- wire format -----------------------------------------------------------

// Every GET reply is a JSON array: [{"numberOfRecords": n}, record, record...]
#[derive(Debug, Deserialize)]
struct RecordCount {
    #[serde(rename = "numberOfRecords")]
    number_of_records: i64,
}

#[derive(Debug, Deserialize)]
struct WirePerson {
    #[serde(rename = "PersonID")]
    id: u64,
    // "Givven" is the middleware's historical spelling.
    #[serde(rename = "PersonGivvenName", default)]
    given_name: Option<String>,
    #[serde(rename = "PersonFamilyName", default)]
    family_name: Option<String>,
    #[serde(rename = "PersonDateOfBirth", default)]
    date_of_birth: Option<String>,
    #[serde(rename = "PersonDateOfDeath", default)]
    date_of_death: Option<String>,
    #[serde(rename = "PersonPlaceOfBirth", default)]
    place_of_birth: Option<String>,
    #[serde(rename = "PersonPlaceOfDeath", default)]
    place_of_death: Option<String>,
    // Nullable flag, sent as bool or 0/1 depending on the endpoint.
    #[serde(rename = "PersonIsMale", default)]
    is_male: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireFather {
    #[serde(rename = "FatherId", alias = "FatherID", default)]
    id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WireMother {
    #[serde(rename = "MotherId", alias = "MotherID", default)]
    id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CommandReply {
    #[serde(default)]
    success: bool,
    #[serde(rename = "personId", default)]
    person_id: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

fn flag_from_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        _ => None,
    }
}

// Dates arrive as "YYYY-MM-DD", sometimes with a time suffix, sometimes "".
fn parse_wire_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    if raw.len() < 10 {
        return None;
    }
    NaiveDate::parse_from_str(&raw[..10], "%Y-%m-%d").ok()
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.trim().is_empty())
}

impl WirePerson {
    fn into_person(self) -> Person {
        Person {
            id: PersonId(self.id),
            given_name: self.given_name.unwrap_or_default(),
            family_name: self.family_name.unwrap_or_default(),
            date_of_birth: parse_wire_date(self.date_of_birth.as_deref()),
            date_of_death: parse_wire_date(self.date_of_death.as_deref()),
            place_of_birth: non_empty(self.place_of_birth),
            place_of_death: non_empty(self.place_of_death),
            sex: Sex::from_flag(self.is_male.as_ref().and_then(flag_from_value)),
            generation: 0,
        }
    }
}

fn split_envelope(body: Vec<Value>) -> Result<Vec<Value>, ServiceError> {
    let Some(first) = body.first() else {
        return Err(ServiceError::Decode("empty reply array".to_string()));
    };
    let count: RecordCount = serde_json::from_value(first.clone())
        .map_err(|err| ServiceError::Decode(err.to_string()))?;
    if count.number_of_records < 1 {
        return Ok(Vec::new());
    }
    Ok(body.into_iter().skip(1).collect())
}

fn decode_records<T: serde::de::DeserializeOwned>(
    records: Vec<Value>,
) -> Result<Vec<T>, ServiceError> {
    records
        .into_iter()
        .map(|value| {
            serde_json::from_value(value).map_err(|err| ServiceError::Decode(err.to_string()))
        })
        .collect()
}

fn draft_body(draft: &PersonDraft) -> Value {
    json!({
        "PersonGivvenName": draft.given_name,
        "PersonFamilyName": draft.family_name,
        "PersonDateOfBirth": draft.date_of_birth.map(|d| d.to_string()),
        "PersonDateOfDeath": draft.date_of_death.map(|d| d.to_string()),
        "PersonPlaceOfBirth": draft.place_of_birth,
        "PersonPlaceOfDeath": draft.place_of_death,
        "PersonIsMale": match draft.sex {
            Sex::Male => Some(1),
            Sex::Female => Some(0),
            Sex::Unknown => None,
        },
    })
}

// --- HTTP implementation ----------------------------------------------------

/// Client for the Familiez middleware.
pub struct HttpFamilyService {
    http: Client,
    base_url: String,
}

impl HttpFamilyService {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_records(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<Value>, ServiceError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.http.get(&url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status(status));
        }
        let body: Vec<Value> = response.json().await?;
        split_envelope(body)
    }

    async fn post_command(&self, path: &str, body: Value) -> Result<CommandReply, ServiceError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status(status));
        }
        let reply: CommandReply = response.json().await?;
        if !reply.success {
            return Err(ServiceError::Rejected(
                reply.error.unwrap_or_else(|| "unknown failure".to_string()),
            ));
        }
        Ok(reply)
    }
}

#[async_trait]
impl FamilyDataSource for HttpFamilyService {
    async fn person_details(&self, id: PersonId) -> Result<Option<Person>, ServiceError> {
        let records = self
            .get_records("GetPersonDetails", &[("personID", id.to_string())])
            .await?;
        let mut persons: Vec<WirePerson> = decode_records(records)?;
        Ok(persons.drain(..).next().map(WirePerson::into_person))
    }

    async fn father_of(&self, child: PersonId) -> Result<Option<PersonId>, ServiceError> {
        let records = self
            .get_records("GetFather", &[("childID", child.to_string())])
            .await?;
        let mut rows: Vec<WireFather> = decode_records(records)?;
        Ok(rows.drain(..).next().and_then(|row| row.id).map(PersonId))
    }

    async fn mother_of(&self, child: PersonId) -> Result<Option<PersonId>, ServiceError> {
        let records = self
            .get_records("GetMother", &[("childID", child.to_string())])
            .await?;
        let mut rows: Vec<WireMother> = decode_records(records)?;
        Ok(rows.drain(..).next().and_then(|row| row.id).map(PersonId))
    }

    async fn children_of(&self, parent: PersonId) -> Result<Vec<Person>, ServiceError> {
        let records = self
            .get_records("GetChildren", &[("personID", parent.to_string())])
            .await?;
        let rows: Vec<WirePerson> = decode_records(records)?;
        Ok(rows.into_iter().map(WirePerson::into_person).collect())
    }

    async fn partners_of(&self, person: PersonId) -> Result<Vec<Person>, ServiceError> {
        let records = self
            .get_records("GetPartners", &[("personID", person.to_string())])
            .await?;
        let rows: Vec<WirePerson> = decode_records(records)?;
        Ok(rows.into_iter().map(WirePerson::into_person).collect())
    }

    async fn persons_matching(&self, text: &str) -> Result<Vec<Person>, ServiceError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let records = self
            .get_records(
                "GetPersonsLike",
                &[("stringToSearchFor", text.to_string())],
            )
            .await?;
        let rows: Vec<WirePerson> = decode_records(records)?;
        Ok(rows.into_iter().map(WirePerson::into_person).collect())
    }

    async fn create_person(&self, draft: &PersonDraft) -> Result<Person, ServiceError> {
        let mut body = draft_body(draft);
        body["FatherId"] = json!(draft.father.map(|id| id.0));
        body["MotherId"] = json!(draft.mother.map(|id| id.0));
        let reply = self.post_command("AddPerson", body).await?;
        let id = reply
            .person_id
            .ok_or_else(|| ServiceError::Decode("AddPerson reply without personId".to_string()))?;
        Ok(Person {
            id: PersonId(id),
            given_name: draft.given_name.clone(),
            family_name: draft.family_name.clone(),
            date_of_birth: draft.date_of_birth,
            date_of_death: draft.date_of_death,
            place_of_birth: draft.place_of_birth.clone(),
            place_of_death: draft.place_of_death.clone(),
            sex: draft.sex,
            generation: 0,
        })
    }

    async fn update_person(&self, id: PersonId, draft: &PersonDraft) -> Result<(), ServiceError> {
        let mut body = draft_body(draft);
        body["personId"] = json!(id.0);
        self.post_command("UpdatePerson", body).await?;
        Ok(())
    }

    async fn delete_person(
        &self,
        id: PersonId,
        revision: Option<&str>,
    ) -> Result<(), ServiceError> {
        let mut body = json!({ "personId": id.0 });
        if let Some(revision) = revision {
            body["revision"] = json!(revision);
        }
        self.post_command("DeletePerson", body).await?;
        Ok(())
    }
}

// --- in-memory implementation ------------------------------------------------

#[derive(Debug, Default)]
struct MemoryTables {
    persons: BTreeMap<PersonId, Person>,
    parents: BTreeMap<PersonId, ParentLink>,
    partners: BTreeMap<PersonId, Vec<PersonId>>,
    next_id: u64,
}

/// In-process data source with the same contract as the middleware. Used by
/// the test suite and handy for demos without a running service.
#[derive(Debug)]
pub struct InMemoryFamily {
    inner: Mutex<MemoryTables>,
}

impl InMemoryFamily {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryTables {
                next_id: 1,
                ..MemoryTables::default()
            }),
        }
    }

    /// Inserts a person with an explicit id, keeping the id counter ahead.
    pub fn seed_person(&self, person: Person) -> PersonId {
        let mut tables = self.inner.lock().unwrap();
        let id = person.id;
        tables.next_id = tables.next_id.max(id.0 + 1);
        tables.persons.insert(id, person);
        id
    }

    pub fn seed_parents(
        &self,
        child: PersonId,
        father: Option<PersonId>,
        mother: Option<PersonId>,
    ) {
        let mut tables = self.inner.lock().unwrap();
        tables.parents.insert(child, ParentLink { father, mother });
    }

    pub fn seed_partners(&self, a: PersonId, b: PersonId) {
        let mut tables = self.inner.lock().unwrap();
        let fwd = tables.partners.entry(a).or_default();
        if !fwd.contains(&b) {
            fwd.push(b);
        }
        let rev = tables.partners.entry(b).or_default();
        if !rev.contains(&a) {
            rev.push(a);
        }
    }
}

impl Default for InMemoryFamily {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FamilyDataSource for InMemoryFamily {
    async fn person_details(&self, id: PersonId) -> Result<Option<Person>, ServiceError> {
        let tables = self.inner.lock().unwrap();
        Ok(tables.persons.get(&id).cloned())
    }

    async fn father_of(&self, child: PersonId) -> Result<Option<PersonId>, ServiceError> {
        let tables = self.inner.lock().unwrap();
        Ok(tables.parents.get(&child).and_then(|link| link.father))
    }

    async fn mother_of(&self, child: PersonId) -> Result<Option<PersonId>, ServiceError> {
        let tables = self.inner.lock().unwrap();
        Ok(tables.parents.get(&child).and_then(|link| link.mother))
    }

    async fn children_of(&self, parent: PersonId) -> Result<Vec<Person>, ServiceError> {
        let tables = self.inner.lock().unwrap();
        let mut children: Vec<Person> = tables
            .parents
            .iter()
            .filter(|(_, link)| link.father == Some(parent) || link.mother == Some(parent))
            .filter_map(|(child, _)| tables.persons.get(child).cloned())
            .collect();
        children.sort_by_key(|p| p.id);
        Ok(children)
    }

    async fn partners_of(&self, person: PersonId) -> Result<Vec<Person>, ServiceError> {
        let tables = self.inner.lock().unwrap();
        let Some(ids) = tables.partners.get(&person) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| tables.persons.get(id).cloned())
            .collect())
    }

    async fn persons_matching(&self, text: &str) -> Result<Vec<Person>, ServiceError> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .persons
            .values()
            .filter(|p| {
                p.given_name.to_lowercase().contains(&needle)
                    || p.family_name.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }

    async fn create_person(&self, draft: &PersonDraft) -> Result<Person, ServiceError> {
        let mut tables = self.inner.lock().unwrap();
        let id = PersonId(tables.next_id);
        tables.next_id += 1;
        let person = Person {
            id,
            given_name: draft.given_name.clone(),
            family_name: draft.family_name.clone(),
            date_of_birth: draft.date_of_birth,
            date_of_death: draft.date_of_death,
            place_of_birth: draft.place_of_birth.clone(),
            place_of_death: draft.place_of_death.clone(),
            sex: draft.sex,
            generation: 0,
        };
        tables.persons.insert(id, person.clone());
        if draft.father.is_some() || draft.mother.is_some() {
            tables.parents.insert(
                id,
                ParentLink {
                    father: draft.father,
                    mother: draft.mother,
                },
            );
        }
        Ok(person)
    }

    async fn update_person(&self, id: PersonId, draft: &PersonDraft) -> Result<(), ServiceError> {
        let mut tables = self.inner.lock().unwrap();
        let Some(person) = tables.persons.get_mut(&id) else {
            return Err(ServiceError::Rejected(format!("no person with id {id}")));
        };
        person.given_name = draft.given_name.clone();
        person.family_name = draft.family_name.clone();
        person.date_of_birth = draft.date_of_birth;
        person.date_of_death = draft.date_of_death;
        person.place_of_birth = draft.place_of_birth.clone();
        person.place_of_death = draft.place_of_death.clone();
        person.sex = draft.sex;
        Ok(())
    }

    async fn delete_person(
        &self,
        id: PersonId,
        _revision: Option<&str>,
    ) -> Result<(), ServiceError> {
        let mut tables = self.inner.lock().unwrap();
        if tables.persons.remove(&id).is_none() {
            return Err(ServiceError::Rejected(format!("no person with id {id}")));
        }
        tables.parents.remove(&id);
        for link in tables.parents.values_mut() {
            if link.father == Some(id) {
                link.father = None;
            }
            if link.mother == Some(id) {
                link.mother = None;
            }
        }
        tables.partners.remove(&id);
        for list in tables.partners.values_mut() {
            list.retain(|other| *other != id);
        }
        Ok(())
    }
}
