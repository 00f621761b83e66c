//! Response envelope normalization and pagination types.
//!
//! The backend may wrap payloads as `{ success, data, pagination? }`. [`normalize`] strips the
//! wrapper so callers only ever see the bare resource, or a [`Paginated`] list whose `meta`
//! block is produced by [`page_meta`].

// self
use crate::_prelude::*;

/// Pagination metadata exposed to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
	/// Current page number.
	pub current_page: Option<u64>,
	/// Page size.
	pub per_page: Option<u64>,
	/// Total number of records.
	pub total: Option<u64>,
	/// Number of the last page.
	pub last_page: Option<u64>,
	/// Index of the first record on this page.
	pub from: Option<u64>,
	/// Index of the last record on this page.
	pub to: Option<u64>,
}

/// Navigation links of a paginated response. The backend never supplies them, so they are
/// always `null` after normalization.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLinks {
	/// Link to the first page.
	pub first: Option<String>,
	/// Link to the last page.
	pub last: Option<String>,
	/// Link to the previous page.
	pub prev: Option<String>,
	/// Link to the next page.
	pub next: Option<String>,
}

/// Normalized paginated list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
	/// Records on the current page.
	pub data: Vec<T>,
	/// Pagination metadata.
	pub meta: PageMeta,
	/// Navigation links.
	pub links: PageLinks,
}

/// Sort direction accepted by list endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
	/// Ascending order.
	Asc,
	/// Descending order.
	Desc,
}
impl SortOrder {
	/// Returns the query-string label.
	pub const fn as_str(self) -> &'static str {
		match self {
			SortOrder::Asc => "asc",
			SortOrder::Desc => "desc",
		}
	}
}

/// Common pagination parameters for list endpoints.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationParams {
	/// Requested page.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub page: Option<u64>,
	/// Requested page size.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub per_page: Option<u64>,
	/// Column to sort by.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub sort_by: Option<String>,
	/// Sort direction.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub sort_order: Option<SortOrder>,
}
impl PaginationParams {
	/// Renders the parameters as query pairs, omitting unset fields.
	pub fn to_query(&self) -> Vec<(String, String)> {
		let mut query = Vec::new();

		if let Some(page) = self.page {
			query.push(("page".to_owned(), page.to_string()));
		}
		if let Some(per_page) = self.per_page {
			query.push(("per_page".to_owned(), per_page.to_string()));
		}
		if let Some(sort_by) = &self.sort_by {
			query.push(("sort_by".to_owned(), sort_by.clone()));
		}
		if let Some(order) = self.sort_order {
			query.push(("sort_order".to_owned(), order.as_str().to_owned()));
		}

		query
	}
}

/// Strips the backend envelope from a successful response body.
///
/// Bodies without a `success` key pass through unchanged, which makes the function a no-op
/// on already-normalized payloads.
pub fn normalize(body: JsonValue) -> JsonValue {
	let mut envelope = match body {
		JsonValue::Object(map) if map.contains_key("success") => map,
		other => return other,
	};

	let data = envelope.remove("data").unwrap_or(JsonValue::Null);

	match envelope.get("pagination") {
		Some(JsonValue::Object(pagination)) => json!({
			"data": data,
			"meta": page_meta(pagination),
			"links": PageLinks::default(),
		}),
		_ => data,
	}
}

/// Maps backend pagination fields onto [`PageMeta`] field names.
///
/// `total_pages` becomes `last_page`; the remaining fields keep their names. Missing fields
/// map to `null`. The mapping is pure.
pub fn page_meta(pagination: &JsonMap<String, JsonValue>) -> JsonValue {
	let field = |name: &str| pagination.get(name).cloned().unwrap_or(JsonValue::Null);

	json!({
		"current_page": field("current_page"),
		"per_page": field("per_page"),
		"total": field("total"),
		"last_page": field("total_pages"),
		"from": field("from"),
		"to": field("to"),
	})
}
