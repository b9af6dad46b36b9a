//! Item route handlers.

use std::time::Duration;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fields;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::FieldValue;
use crate::store::Item;

const MAX_PAGE_ITEMS: u32 = 100;

const WORDS: &[&str] = &[
    "alpha", "amber", "bright", "cedar", "delta", "ember", "fable", "granite", "harbor", "ivory",
    "jade", "kestrel", "lumen", "maple", "north", "onyx", "prairie", "quartz", "river", "summit",
];
const VERBS: &[&str] = &[
    "aggregate", "deploy", "enable", "harness", "integrate", "leverage", "orchestrate", "scale",
    "streamline", "synergize",
];
const ADJECTIVES: &[&str] = &[
    "scalable", "real-time", "seamless", "robust", "cross-platform", "frictionless", "holistic",
    "end-to-end", "distributed", "proactive",
];
const NOUNS: &[&str] = &[
    "platforms", "pipelines", "architectures", "paradigms", "infrastructures", "channels",
    "workflows", "metrics", "solutions", "networks",
];

fn pick(words: &[&'static str]) -> &'static str {
    words.choose(&mut rand::thread_rng()).copied().unwrap_or_default()
}

fn fake_slug() -> String {
    format!("{}-{}-{}", pick(WORDS), pick(WORDS), pick(WORDS))
}

fn fake_phrase() -> String {
    format!("{} {} {}", pick(VERBS), pick(ADJECTIVES), pick(NOUNS))
}

fn yes() -> bool {
    true
}

fn first_page() -> u32 {
    1
}

fn default_page_items() -> u32 {
    10
}

#[derive(Debug, Deserialize)]
pub struct SleepParams {
    #[serde(default = "yes")]
    pub sleep: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "default_page_items")]
    pub page_items: u32,
    #[serde(default = "yes")]
    pub sleep: bool,
}

/// Body of `POST /items/`; missing fields are generated.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewItem {
    #[serde(default = "fake_slug")]
    pub name: String,
    #[serde(default = "fake_phrase")]
    pub description: String,
}

impl Default for NewItem {
    fn default() -> Self {
        Self {
            name: fake_slug(),
            description: fake_phrase(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse {
    pub items: Vec<Item>,
    pub page: u32,
    pub page_items: u32,
    pub total_items: u64,
    pub total_pages: u64,
}

/// Sleep a random 1 to 10 seconds.
async fn random_sleep(state: &AppState) {
    let secs: u64 = rand::thread_rng().gen_range(1..=10);
    state
        .logger
        .info(format!("sleeping for {secs} seconds"), fields! {});
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    params
        .map(|Query(params)| params)
        .map_err(|rejection| ApiError::Validation(rejection.body_text()))
}

pub async fn post_items(
    State(state): State<AppState>,
    params: Result<Query<SleepParams>, QueryRejection>,
    body: Bytes,
) -> Result<Json<Item>, ApiError> {
    let params = query(params)?;
    if params.sleep {
        random_sleep(&state).await;
    }

    let request = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        serde_json::from_slice::<Option<NewItem>>(&body)
            .map_err(|e| ApiError::Validation(e.to_string()))?
    };
    let request = match request {
        Some(request) => request,
        None => {
            state
                .logger
                .debug("item is None and creating a random item", fields! {});
            NewItem::default()
        }
    };

    let now = Utc::now();
    let new_item = Item {
        id: Uuid::new_v4(),
        name: request.name,
        description: Some(request.description),
        created_at: now,
        updated_at: now,
    };
    state.logger.info(
        "new_item",
        fields! { "new_item" => FieldValue::object(new_item.clone()) },
    );

    let new_value = state.store.insert(new_item).await?;
    state.logger.info(
        "new_value",
        fields! { "new_value" => FieldValue::object(new_value.clone()) },
    );

    Ok(Json(new_value))
}

pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    params: Result<Query<SleepParams>, QueryRejection>,
) -> Result<Json<Item>, ApiError> {
    let id = Uuid::parse_str(&id)
        .map_err(|e| ApiError::Validation(format!("invalid item id: {e}")))?;
    let params = query(params)?;
    if params.sleep {
        random_sleep(&state).await;
    }

    let value = state.store.get(id).await?;
    state.logger.info(
        "get_items_id",
        fields! {
            "id" => id,
            "item" => value.clone().map(FieldValue::object),
        },
    );

    match value {
        Some(item) => Ok(Json(item)),
        None => {
            state.logger.error(format!("item not found: {id}"), fields! {});
            Err(ApiError::NotFound)
        }
    }
}

pub async fn get_items(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<PaginatedResponse>, ApiError> {
    let params = query(params)?;
    if params.page < 1 {
        return Err(ApiError::Validation("page must be >= 1".into()));
    }
    if !(1..=MAX_PAGE_ITEMS).contains(&params.page_items) {
        return Err(ApiError::Validation(format!(
            "page_items must be between 1 and {MAX_PAGE_ITEMS}"
        )));
    }
    if params.sleep {
        random_sleep(&state).await;
    }

    let limit = params.page_items as usize;
    let offset = (params.page as usize - 1) * limit;
    let items = state.store.list(limit, offset).await?;
    state.logger.info(
        "get_items",
        fields! { "items" => FieldValue::object(items.clone()) },
    );

    let total_items = state.store.count().await? as u64;
    let paginated = PaginatedResponse {
        items,
        page: params.page,
        page_items: params.page_items,
        total_items,
        total_pages: total_items.div_ceil(u64::from(params.page_items)),
    };
    state.logger.info(
        "paginated_response",
        fields! { "paginated_response" => FieldValue::object(paginated.clone()) },
    );

    Ok(Json(paginated))
}

pub async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
