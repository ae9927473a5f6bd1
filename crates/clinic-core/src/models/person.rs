//! Patient, doctor and specialty records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::join_name;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    /// National identification number (cédula)
    #[serde(default, alias = "cedula")]
    pub identification: Option<String>,
    #[serde(default, alias = "nombres")]
    pub first_name: Option<String>,
    #[serde(default, alias = "apellidos")]
    pub last_name: Option<String>,
    #[serde(default, alias = "telefono")]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        join_name(self.first_name.as_deref(), self.last_name.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: i64,
    #[serde(default, alias = "nombres")]
    pub first_name: Option<String>,
    #[serde(default, alias = "apellidos")]
    pub last_name: Option<String>,
    /// Either a specialty id or an embedded specialty object
    #[serde(default, alias = "especialidad")]
    pub specialty: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        join_name(self.first_name.as_deref(), self.last_name.as_deref())
    }

    pub fn specialty_id(&self) -> Option<i64> {
        match self.specialty.as_ref()? {
            Value::Number(n) => n.as_i64(),
            Value::Object(obj) => obj.get("id").and_then(Value::as_i64),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Specialty {
    pub id: i64,
    #[serde(default, alias = "nombre")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
