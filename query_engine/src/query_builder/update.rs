use super::args::UniqueWhere;
use super::filter::to_json;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Type of update operation to perform on a field
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOperation {
    /// field = $N
    Set(Value),
    /// field = field + $N
    Increment(Value),
    /// field = field - $N
    Decrement(Value),
    /// field = field * $N
    Multiply(Value),
    /// field = field / $N
    Divide(Value),
    /// Append one value or a list of values to a list field
    Push(Value),
}

impl UpdateOperation {
    /// Arithmetic operator, for numeric operations
    pub fn arithmetic_operator(&self) -> Option<&'static str> {
        match self {
            UpdateOperation::Increment(_) => Some("+"),
            UpdateOperation::Decrement(_) => Some("-"),
            UpdateOperation::Multiply(_) => Some("*"),
            UpdateOperation::Divide(_) => Some("/"),
            UpdateOperation::Set(_) | UpdateOperation::Push(_) => None,
        }
    }

    /// Get the value to bind as a parameter
    pub fn value(&self) -> &Value {
        match self {
            UpdateOperation::Set(v)
            | UpdateOperation::Increment(v)
            | UpdateOperation::Decrement(v)
            | UpdateOperation::Multiply(v)
            | UpdateOperation::Divide(v)
            | UpdateOperation::Push(v) => v,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            UpdateOperation::Set(_) => "set",
            UpdateOperation::Increment(_) => "increment",
            UpdateOperation::Decrement(_) => "decrement",
            UpdateOperation::Multiply(_) => "multiply",
            UpdateOperation::Divide(_) => "divide",
            UpdateOperation::Push(_) => "push",
        }
    }

    fn from_json(map: &Map<String, Value>) -> Option<Result<Self, String>> {
        if map.len() != 1 {
            return None;
        }
        let (key, value) = map.iter().next()?;
        let value = value.clone();
        Some(Ok(match key.as_str() {
            "set" => UpdateOperation::Set(value),
            "increment" => UpdateOperation::Increment(value),
            "decrement" => UpdateOperation::Decrement(value),
            "multiply" => UpdateOperation::Multiply(value),
            "divide" => UpdateOperation::Divide(value),
            "push" => UpdateOperation::Push(value),
            _ => return None,
        }))
    }
}

/// Nested writes on one relation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationWrite {
    pub create: Vec<CreateData>,
    pub connect: Vec<UniqueWhere>,
    pub disconnect: Vec<UniqueWhere>,
    /// Clear an optional to-one relation
    pub disconnect_current: bool,
}

impl RelationWrite {
    fn is_relation_write(map: &Map<String, Value>) -> bool {
        !map.is_empty()
            && map
                .keys()
                .all(|k| matches!(k.as_str(), "create" | "connect" | "disconnect"))
    }

    fn from_json(map: &Map<String, Value>) -> Result<Self, String> {
        fn many<T>(
            value: &Value,
            parse: impl Fn(&Value) -> Result<T, String>,
        ) -> Result<Vec<T>, String> {
            match value {
                Value::Array(items) => items.iter().map(parse).collect(),
                other => Ok(vec![parse(other)?]),
            }
        }

        let mut write = RelationWrite::default();
        for (key, value) in map {
            match key.as_str() {
                "create" => write.create = many(value, CreateData::from_json)?,
                "connect" => write.connect = many(value, UniqueWhere::from_json)?,
                _ => match value {
                    Value::Bool(flag) => write.disconnect_current = *flag,
                    other => write.disconnect = many(other, UniqueWhere::from_json)?,
                },
            }
        }
        Ok(write)
    }
}

fn push_relation<'a>(relations: &'a mut Vec<(String, RelationWrite)>, relation: &str) -> &'a mut RelationWrite {
    let index = match relations.iter().position(|(name, _)| name == relation) {
        Some(index) => index,
        None => {
            relations.push((relation.to_string(), RelationWrite::default()));
            relations.len() - 1
        }
    };
    &mut relations[index].1
}

/// Column values and nested writes for a create
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateData {
    pub fields: Vec<(String, Value)>,
    pub relations: Vec<(String, RelationWrite)>,
}

impl CreateData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: Serialize>(mut self, field: &str, value: T) -> Self {
        self.fields.retain(|(name, _)| name != field);
        self.fields.push((field.to_string(), to_json(value)));
        self
    }

    /// Create the related row(s) in the same operation
    pub fn create_related(mut self, relation: &str, data: CreateData) -> Self {
        push_relation(&mut self.relations, relation).create.push(data);
        self
    }

    /// Link an existing row
    pub fn connect(mut self, relation: &str, target: impl Into<UniqueWhere>) -> Self {
        push_relation(&mut self.relations, relation)
            .connect
            .push(target.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Parse `{ "name": "Shoes", "category": { "connect": { "id": "..." } } }`
    pub fn from_json(value: &Value) -> Result<Self, String> {
        let map = value
            .as_object()
            .ok_or_else(|| format!("Create data must be an object, got {}", value))?;
        let mut data = CreateData::new();
        for (key, value) in map {
            match value {
                Value::Object(inner) if RelationWrite::is_relation_write(inner) => {
                    data.relations
                        .push((key.clone(), RelationWrite::from_json(inner)?));
                }
                Value::Object(inner) => match UpdateOperation::from_json(inner) {
                    Some(Ok(UpdateOperation::Set(v))) => data.fields.push((key.clone(), v)),
                    _ => return Err(format!("Invalid value for `{}` in create data", key)),
                },
                other => data.fields.push((key.clone(), other.clone())),
            }
        }
        Ok(data)
    }
}

impl<'de> Deserialize<'de> for CreateData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        CreateData::from_json(&value).map_err(serde::de::Error::custom)
    }
}

/// Container for update operations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateData {
    pub fields: Vec<(String, UpdateOperation)>,
    pub relations: Vec<(String, RelationWrite)>,
}

impl UpdateData {
    pub fn new() -> Self {
        Self::default()
    }

    fn with(mut self, field: &str, operation: UpdateOperation) -> Self {
        self.fields.retain(|(name, _)| name != field);
        self.fields.push((field.to_string(), operation));
        self
    }

    pub fn set<T: Serialize>(self, field: &str, value: T) -> Self {
        self.with(field, UpdateOperation::Set(to_json(value)))
    }

    /// Nullable fields only
    pub fn set_null(self, field: &str) -> Self {
        self.with(field, UpdateOperation::Set(Value::Null))
    }

    pub fn increment<T: Serialize>(self, field: &str, by: T) -> Self {
        self.with(field, UpdateOperation::Increment(to_json(by)))
    }

    pub fn decrement<T: Serialize>(self, field: &str, by: T) -> Self {
        self.with(field, UpdateOperation::Decrement(to_json(by)))
    }

    pub fn multiply<T: Serialize>(self, field: &str, by: T) -> Self {
        self.with(field, UpdateOperation::Multiply(to_json(by)))
    }

    pub fn divide<T: Serialize>(self, field: &str, by: T) -> Self {
        self.with(field, UpdateOperation::Divide(to_json(by)))
    }

    /// Append to a list field; a list argument appends each element in order
    pub fn push<T: Serialize>(self, field: &str, value: T) -> Self {
        self.with(field, UpdateOperation::Push(to_json(value)))
    }

    pub fn create_related(mut self, relation: &str, data: CreateData) -> Self {
        push_relation(&mut self.relations, relation).create.push(data);
        self
    }

    pub fn connect(mut self, relation: &str, target: impl Into<UniqueWhere>) -> Self {
        push_relation(&mut self.relations, relation)
            .connect
            .push(target.into());
        self
    }

    /// Unlink a related row of a to-many relation
    pub fn disconnect(mut self, relation: &str, target: impl Into<UniqueWhere>) -> Self {
        push_relation(&mut self.relations, relation)
            .disconnect
            .push(target.into());
        self
    }

    /// Clear an optional to-one relation
    pub fn disconnect_current(mut self, relation: &str) -> Self {
        push_relation(&mut self.relations, relation).disconnect_current = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.relations.is_empty()
    }

    /// Parse `{ "price": { "increment": 5 }, "images": { "push": "b.png" }, "name": "x" }`
    pub fn from_json(value: &Value) -> Result<Self, String> {
        let map = value
            .as_object()
            .ok_or_else(|| format!("Update data must be an object, got {}", value))?;
        let mut data = UpdateData::new();
        for (key, value) in map {
            match value {
                Value::Object(inner) if RelationWrite::is_relation_write(inner) => {
                    data.relations
                        .push((key.clone(), RelationWrite::from_json(inner)?));
                }
                Value::Object(inner) => {
                    let operation = UpdateOperation::from_json(inner)
                        .ok_or_else(|| format!("Invalid update operation for `{}`", key))??;
                    data.fields.push((key.clone(), operation));
                }
                other => data
                    .fields
                    .push((key.clone(), UpdateOperation::Set(other.clone()))),
            }
        }
        Ok(data)
    }
}

impl<'de> Deserialize<'de> for UpdateData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        UpdateData::from_json(&value).map_err(serde::de::Error::custom)
    }
}
