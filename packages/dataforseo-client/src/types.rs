use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// --- Task submission ---

/// One task spec for the google_trends/explore task_post endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct TrendsTaskSpec {
    pub keywords: Vec<String>,
    pub location_code: u32,
    pub language_code: String,
    /// Preset range understood by the provider, e.g. "past_7_days".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postback_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postback_data: Option<String>,
    /// Opaque caller data, echoed back in the callback payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Top-level response envelope for any v3 endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    pub status_code: u32,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub tasks: Vec<TaskEnvelope>,
}

/// Per-task acknowledgement returned by task_post.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskEnvelope {
    #[serde(default)]
    pub id: Option<String>,
    pub status_code: u32,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub cost: Option<f64>,
}

// --- Callback payload ---

/// Body the provider POSTs to the postback URL when a task finishes.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackPayload {
    #[serde(default)]
    pub status_code: Option<u32>,
    #[serde(default)]
    pub tasks: Vec<TaskResult>,
}

/// One finished task inside a callback (or a task_get response).
#[derive(Debug, Clone, Deserialize)]
pub struct TaskResult {
    pub id: String,
    pub status_code: u32,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub result: Option<Vec<TrendsResult>>,
}

impl TaskResult {
    /// Provider convention: codes at/above 40000 are errors.
    pub fn is_success(&self) -> bool {
        self.status_code < ERROR_STATUS_THRESHOLD
    }
}

/// Status codes at/above this value denote a failed task.
pub const ERROR_STATUS_THRESHOLD: u32 = 40000;

/// One explore result: the queried keywords plus a list of typed items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendsResult {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub location_code: Option<u32>,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub check_url: Option<String>,
    #[serde(default)]
    pub datetime: Option<String>,
    #[serde(default)]
    pub items: Vec<ResultItem>,
}

// --- Result items (tagged union) ---

/// One point on an interest-over-time graph. `values` holds one entry per
/// keyword in the item's keyword list; null means the provider had no data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphPoint {
    #[serde(default)]
    pub date_from: Option<String>,
    #[serde(default)]
    pub date_to: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub missing_data: bool,
    #[serde(default)]
    pub values: Vec<Option<f64>>,
}

/// Regional interest breakdown entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapPoint {
    #[serde(default)]
    pub geo_id: Option<String>,
    #[serde(default)]
    pub geo_name: Option<String>,
    #[serde(default)]
    pub values: Vec<Option<f64>>,
    #[serde(default)]
    pub max_value_index: Option<u32>,
}

/// Related-topic entry from a topics list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopicEntry {
    #[serde(default)]
    pub topic_id: Option<String>,
    #[serde(default)]
    pub topic_title: Option<String>,
    #[serde(default)]
    pub topic_type: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
}

/// Related-query entry from a queries list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryEntry {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct GraphData {
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    data: Vec<GraphPoint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct MapData {
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    data: Vec<MapPoint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RankedData<T> {
    #[serde(default)]
    rising: Vec<T>,
    #[serde(default)]
    top: Vec<T>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RankedListData<T> {
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    data: Option<RankedData<T>>,
}

/// A typed item inside a trends result. The provider discriminates on the
/// `type` field; anything unrecognized is preserved raw for forward
/// compatibility instead of failing the whole payload.
#[derive(Debug, Clone, Serialize)]
pub enum ResultItem {
    Graph {
        keywords: Vec<String>,
        data: Vec<GraphPoint>,
    },
    Map {
        keywords: Vec<String>,
        data: Vec<MapPoint>,
    },
    Topics {
        keywords: Vec<String>,
        rising: Vec<TopicEntry>,
        top: Vec<TopicEntry>,
    },
    Queries {
        keywords: Vec<String>,
        rising: Vec<QueryEntry>,
        top: Vec<QueryEntry>,
    },
    Unknown {
        item_type: String,
        raw: Value,
    },
}

impl ResultItem {
    /// Total parser: never fails, shapes it cannot read fall through to
    /// `Unknown` with the original payload attached.
    pub fn from_value(value: &Value) -> ResultItem {
        let item_type = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        match item_type.as_str() {
            "google_trends_graph" => parse_graph(value),
            "google_trends_map" => parse_map(value),
            "google_trends_topics_list" => parse_topics(value),
            "google_trends_queries_list" => parse_queries(value),
            _ => ResultItem::Unknown {
                item_type,
                raw: value.clone(),
            },
        }
    }
}

fn parse_graph(value: &Value) -> ResultItem {
    match serde_json::from_value::<GraphData>(value.clone()) {
        Ok(g) => ResultItem::Graph {
            keywords: g.keywords,
            data: g.data,
        },
        Err(_) => unknown(value),
    }
}

fn parse_map(value: &Value) -> ResultItem {
    match serde_json::from_value::<MapData>(value.clone()) {
        Ok(m) => ResultItem::Map {
            keywords: m.keywords,
            data: m.data,
        },
        Err(_) => unknown(value),
    }
}

fn parse_topics(value: &Value) -> ResultItem {
    match serde_json::from_value::<RankedListData<TopicEntry>>(value.clone()) {
        Ok(t) => {
            let data = t.data.unwrap_or_default();
            ResultItem::Topics {
                keywords: t.keywords,
                rising: data.rising,
                top: data.top,
            }
        }
        Err(_) => unknown(value),
    }
}

fn parse_queries(value: &Value) -> ResultItem {
    match serde_json::from_value::<RankedListData<QueryEntry>>(value.clone()) {
        Ok(q) => {
            let data = q.data.unwrap_or_default();
            ResultItem::Queries {
                keywords: q.keywords,
                rising: data.rising,
                top: data.top,
            }
        }
        Err(_) => unknown(value),
    }
}

fn unknown(value: &Value) -> ResultItem {
    ResultItem::Unknown {
        item_type: value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        raw: value.clone(),
    }
}

impl<'de> Deserialize<'de> for ResultItem {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(ResultItem::from_value(&value))
    }
}
