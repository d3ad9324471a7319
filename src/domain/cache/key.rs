//! Cache key derivation from logical resource queries

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::pagination::PageRequest;

pub const PARAM_ID: &str = "id";
pub const PARAM_PAGE: &str = "page";
pub const PARAM_PAGE_SIZE: &str = "pageSize";

/// Entity collections whose reads are cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceType {
    Order,
    InventoryItem,
}

impl ResourceType {
    pub const ALL: [ResourceType; 2] = [ResourceType::Order, ResourceType::InventoryItem];

    /// Name of the flag that expands the related entity in the payload
    pub fn include_flag(&self) -> &'static str {
        match self {
            ResourceType::Order => "withItems",
            ResourceType::InventoryItem => "withOrder",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::Order => write!(f, "Order"),
            ResourceType::InventoryItem => write!(f, "InventoryItem"),
        }
    }
}

/// Read operation shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOperation {
    List,
    GetById,
}

impl fmt::Display for CacheOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheOperation::List => write!(f, "List"),
            CacheOperation::GetById => write!(f, "GetById"),
        }
    }
}

/// Normalized query parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl ParamValue {
    fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Text(s) => write!(f, "{}", escape(s)),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

/// Percent-escapes the characters that delimit key segments
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());

    for c in value.chars() {
        match c {
            '%' => out.push_str("%25"),
            '&' => out.push_str("%26"),
            '=' => out.push_str("%3D"),
            ':' => out.push_str("%3A"),
            _ => out.push(c),
        }
    }

    out
}

/// Logical description of a read, used only to derive a cache key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceQuery {
    resource_type: ResourceType,
    operation: CacheOperation,
    params: BTreeMap<String, ParamValue>,
}

impl ResourceQuery {
    pub fn new(resource_type: ResourceType, operation: CacheOperation) -> Self {
        Self {
            resource_type,
            operation,
            params: BTreeMap::new(),
        }
    }

    /// Query for one page of a collection
    pub fn list(resource_type: ResourceType, page: PageRequest, include_related: bool) -> Self {
        Self::new(resource_type, CacheOperation::List)
            .with_param(PARAM_PAGE, page.page())
            .with_param(PARAM_PAGE_SIZE, page.page_size())
            .with_param(resource_type.include_flag(), include_related)
    }

    /// Query for a single entity
    pub fn by_id(resource_type: ResourceType, id: i64, include_related: bool) -> Self {
        Self::new(resource_type, CacheOperation::GetById)
            .with_param(PARAM_ID, id)
            .with_param(resource_type.include_flag(), include_related)
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn operation(&self) -> CacheOperation {
        self.operation
    }

    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    /// Include flag value; an omitted flag means `false`
    pub fn include_related(&self) -> bool {
        self.params
            .get(self.resource_type.include_flag())
            .and_then(ParamValue::as_bool)
            .unwrap_or(false)
    }

    /// Params with the include flag normalized to its default when absent
    fn normalized_params(&self) -> BTreeMap<&str, String> {
        let mut params: BTreeMap<&str, String> = self
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.to_string()))
            .collect();

        params
            .entry(self.resource_type.include_flag())
            .or_insert_with(|| false.to_string());

        params
    }
}

/// Derives cache keys from resource queries
pub trait KeyPolicy: Send + Sync + fmt::Debug {
    /// Pure, deterministic key for a query
    fn derive_key(&self, query: &ResourceQuery) -> String;

    /// Both singleton keys of an entity (plain and with related expansion)
    fn singleton_keys(&self, resource_type: ResourceType, id: i64) -> [String; 2] {
        [
            self.derive_key(&ResourceQuery::by_id(resource_type, id, false)),
            self.derive_key(&ResourceQuery::by_id(resource_type, id, true)),
        ]
    }

    /// Prefix shared by every list key of a resource type
    fn list_prefix(&self, resource_type: ResourceType) -> String;

    /// Key of the set holding the live list keys of a resource type
    ///
    /// Never matches `list_prefix` or a singleton key.
    fn registry_key(&self, resource_type: ResourceType) -> String;
}

/// Key format:
///
/// - list: `{Resource}:List:{name}={value}&...` with params sorted by name
/// - get by id: `{Resource}:{id}` or `{Resource}:{id}:{includeFlag}`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultKeyPolicy;

impl DefaultKeyPolicy {
    pub fn new() -> Self {
        Self
    }

    fn join_params<'a>(params: impl Iterator<Item = (&'a str, &'a String)>) -> String {
        params
            .map(|(k, v)| format!("{}={}", escape(k), v))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl KeyPolicy for DefaultKeyPolicy {
    fn derive_key(&self, query: &ResourceQuery) -> String {
        let resource = query.resource_type();
        let params = query.normalized_params();
        let id = query.param(PARAM_ID).and_then(ParamValue::as_int);

        match (query.operation(), id) {
            (CacheOperation::GetById, Some(id)) => {
                let include_flag = resource.include_flag();
                let mut key = format!("{}:{}", resource, id);

                if query.include_related() {
                    key.push(':');
                    key.push_str(include_flag);
                }

                let rest = Self::join_params(
                    params
                        .iter()
                        .filter(|(k, _)| **k != PARAM_ID && **k != include_flag)
                        .map(|(k, v)| (*k, v)),
                );

                if !rest.is_empty() {
                    key.push(':');
                    key.push_str(&rest);
                }

                key
            }
            (operation, _) => format!(
                "{}:{}:{}",
                resource,
                operation,
                Self::join_params(params.iter().map(|(k, v)| (*k, v)))
            ),
        }
    }

    fn list_prefix(&self, resource_type: ResourceType) -> String {
        format!("{}:{}:", resource_type, CacheOperation::List)
    }

    fn registry_key(&self, resource_type: ResourceType) -> String {
        format!("{}:Registry", resource_type)
    }
}
