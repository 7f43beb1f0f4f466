use serde::{Deserialize, Serialize};

fn default_port() -> u16 {
    22
}

fn default_user() -> String {
    "pitmaster".to_string()
}

fn default_state() -> String {
    "UNKNOWN".to_string()
}

/// Registry document: nodes with their resources, aliases, groups and users.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RegistryDto {
    #[serde(default)]
    pub nodes: Vec<NodeDto>,
    #[serde(default)]
    pub aliases: Vec<AliasDto>,
    #[serde(default)]
    pub groups: Vec<GroupDto>,
    #[serde(default)]
    pub users: Vec<UserDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NodeDto {
    pub id: String,
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default)]
    pub resources: Vec<ResourceDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDto {
    #[serde(rename = "type")]
    pub typ: String,
    pub name: String,
    pub index: u32,

    /// Display alias of `name`. Only written, ignored when reading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AliasDto {
    pub alias: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GroupDto {
    pub id: String,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserDto {
    pub id: String,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub groups: Vec<String>,
}
