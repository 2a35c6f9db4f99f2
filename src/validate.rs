//! # Validator / Normalizer
//! Turns raw adapter payloads into canonical, schema-checked records, or
//! rejects them. Pure and side-effect-free: same payload in, same verdict
//! out. The executor treats a rejection like a permanent fetch failure;
//! retrying a malformed payload will not fix it.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::model::{
    DataKind, FundingDetails, HousingStatistics, IncomeLimitRow, NormalizedRecord, PublicNotice,
    RawResult, RecordBody,
};

/// Validate and canonicalize one raw result.
pub fn normalize(raw: RawResult) -> Result<NormalizedRecord, ValidationError> {
    let mut raw = raw;
    let kind = raw.kind;
    let obj = match std::mem::replace(&mut raw.payload, Value::Null) {
        Value::Object(map) => map,
        other => {
            return Err(ValidationError::UnexpectedStructure {
                kind,
                detail: format!("expected a JSON object, got {}", json_type_name(&other)),
            })
        }
    };

    let version = schema_version(kind, &obj)?;

    let body = match kind {
        DataKind::Statistics => normalize_statistics(&raw, obj)?,
        DataKind::IncomeLimits => normalize_income_limits(obj)?,
        DataKind::Notices => normalize_notices(obj)?,
        DataKind::FundingDetails => normalize_funding(&raw, obj)?,
    };

    Ok(NormalizedRecord {
        schema_version: version,
        body,
    })
}

/// Canonicalize scraped text: decode HTML entities, strip tags, normalize
/// curly quotes, collapse whitespace, cap the length.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

fn is_http_url(s: &str) -> bool {
    static RE_URL: OnceCell<Regex> = OnceCell::new();
    let re = RE_URL.get_or_init(|| Regex::new(r"^https?://\S+$").expect("url regex"));
    re.is_match(s)
}

fn schema_version(kind: DataKind, obj: &Map<String, Value>) -> Result<u32, ValidationError> {
    let raw = obj.get("schema_version").ok_or(ValidationError::MissingField {
        kind,
        field: "schema_version",
    })?;
    let got = raw
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| ValidationError::UnexpectedStructure {
            kind,
            detail: format!("schema_version is not a small integer: {raw}"),
        })?;
    let expected = kind.schema_version();
    if got != expected {
        return Err(ValidationError::SchemaVersion {
            kind,
            got,
            expected,
        });
    }
    Ok(got)
}

fn require<'a>(
    kind: DataKind,
    obj: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, ValidationError> {
    obj.get(field)
        .ok_or(ValidationError::MissingField { kind, field })
}

fn check_non_negative(
    kind: DataKind,
    field: &'static str,
    value: f64,
) -> Result<(), ValidationError> {
    // `!(v >= 0)` also rejects NaN.
    if !(value >= 0.0) || !value.is_finite() {
        return Err(ValidationError::OutOfRange {
            kind,
            field,
            detail: format!("{value} is not a non-negative number"),
        });
    }
    Ok(())
}

fn normalize_statistics(
    raw: &RawResult,
    mut obj: Map<String, Value>,
) -> Result<RecordBody, ValidationError> {
    const KIND: DataKind = DataKind::Statistics;
    for field in [
        "total_affordable_units",
        "total_projects",
        "county_funding_millions",
        "federal_funding_millions",
        "units_by_status",
        "units_by_city",
    ] {
        require(KIND, &obj, field)?;
    }
    if !obj.contains_key("last_updated") {
        obj.insert(
            "last_updated".to_string(),
            Value::String(raw.fetched_at.to_rfc3339()),
        );
    }

    let stats: HousingStatistics =
        serde_json::from_value(Value::Object(obj)).map_err(|e| {
            ValidationError::UnexpectedStructure {
                kind: KIND,
                detail: e.to_string(),
            }
        })?;

    if stats.total_affordable_units == 0 || stats.total_affordable_units > 1_000_000 {
        return Err(ValidationError::OutOfRange {
            kind: KIND,
            field: "total_affordable_units",
            detail: format!("{} outside 1..=1000000", stats.total_affordable_units),
        });
    }
    if stats.total_projects == 0 || stats.total_projects > 100_000 {
        return Err(ValidationError::OutOfRange {
            kind: KIND,
            field: "total_projects",
            detail: format!("{} outside 1..=100000", stats.total_projects),
        });
    }
    check_non_negative(KIND, "county_funding_millions", stats.county_funding_millions)?;
    check_non_negative(
        KIND,
        "federal_funding_millions",
        stats.federal_funding_millions,
    )?;

    Ok(RecordBody::Statistics(stats))
}

fn normalize_income_limits(obj: Map<String, Value>) -> Result<RecordBody, ValidationError> {
    const KIND: DataKind = DataKind::IncomeLimits;
    let rows_value = require(KIND, &obj, "rows")?.clone();
    let rows: Vec<IncomeLimitRow> = serde_json::from_value(rows_value).map_err(|e| {
        ValidationError::UnexpectedStructure {
            kind: KIND,
            detail: e.to_string(),
        }
    })?;

    if rows.is_empty() {
        // A limits document always carries at least one row; an empty table
        // means the extractor misread the layout.
        return Err(ValidationError::UnexpectedStructure {
            kind: KIND,
            detail: "no income limit rows".to_string(),
        });
    }

    for row in &rows {
        if !(2000..=2100).contains(&row.year) {
            return Err(ValidationError::OutOfRange {
                kind: KIND,
                field: "year",
                detail: format!("{} outside 2000..=2100", row.year),
            });
        }
        if !(1..=12).contains(&row.family_size) {
            return Err(ValidationError::OutOfRange {
                kind: KIND,
                field: "family_size",
                detail: format!("{} outside 1..=12", row.family_size),
            });
        }
        let bands = [
            ("ami_30_percent", row.ami_30_percent),
            ("ami_50_percent", row.ami_50_percent),
            ("ami_80_percent", row.ami_80_percent),
            ("ami_120_percent", row.ami_120_percent),
        ];
        let mut previous: Option<f64> = None;
        for (field, band) in bands {
            let Some(value) = band else { continue };
            if !value.is_finite() || value <= 0.0 {
                return Err(ValidationError::OutOfRange {
                    kind: KIND,
                    field,
                    detail: format!("{value} is not a positive number"),
                });
            }
            if let Some(prev) = previous {
                if value < prev {
                    return Err(ValidationError::OutOfRange {
                        kind: KIND,
                        field,
                        detail: format!("AMI bands must be non-decreasing ({value} < {prev})"),
                    });
                }
            }
            previous = Some(value);
        }
        for (field, rent) in [
            ("max_rent_30", row.max_rent_30),
            ("max_rent_50", row.max_rent_50),
            ("max_rent_80", row.max_rent_80),
        ] {
            if let Some(value) = rent {
                if !value.is_finite() || value <= 0.0 {
                    return Err(ValidationError::OutOfRange {
                        kind: KIND,
                        field,
                        detail: format!("{value} is not a positive number"),
                    });
                }
            }
        }
    }

    Ok(RecordBody::IncomeLimits { rows })
}

fn normalize_notices(obj: Map<String, Value>) -> Result<RecordBody, ValidationError> {
    const KIND: DataKind = DataKind::Notices;
    let notices_value = require(KIND, &obj, "notices")?.clone();
    let raw_notices: Vec<PublicNotice> = serde_json::from_value(notices_value).map_err(|e| {
        ValidationError::UnexpectedStructure {
            kind: KIND,
            detail: e.to_string(),
        }
    })?;

    // An empty listing is a legitimate answer (no recent notices), unlike an
    // empty income-limits table.
    let mut notices = Vec::with_capacity(raw_notices.len());
    for mut notice in raw_notices {
        notice.title = normalize_text(&notice.title);
        if notice.title.is_empty() {
            return Err(ValidationError::OutOfRange {
                kind: KIND,
                field: "title",
                detail: "empty after normalization".to_string(),
            });
        }
        notice.notice_type = normalize_text(&notice.notice_type).to_lowercase();
        if notice.notice_type.is_empty() {
            return Err(ValidationError::OutOfRange {
                kind: KIND,
                field: "notice_type",
                detail: "empty after normalization".to_string(),
            });
        }
        if !is_http_url(&notice.content_url) {
            return Err(ValidationError::OutOfRange {
                kind: KIND,
                field: "content_url",
                detail: format!("not an http(s) url: {}", notice.content_url),
            });
        }
        notice.summary = notice
            .summary
            .as_deref()
            .map(normalize_text)
            .filter(|s| !s.is_empty());
        for doc in &notice.documents {
            if !is_http_url(doc) {
                return Err(ValidationError::OutOfRange {
                    kind: KIND,
                    field: "documents",
                    detail: format!("not an http(s) url: {doc}"),
                });
            }
        }
        notices.push(notice);
    }

    Ok(RecordBody::Notices { notices })
}

fn normalize_funding(
    raw: &RawResult,
    mut obj: Map<String, Value>,
) -> Result<RecordBody, ValidationError> {
    const KIND: DataKind = DataKind::FundingDetails;
    for field in ["county_funding_millions", "federal_funding_millions"] {
        require(KIND, &obj, field)?;
    }
    if !obj.contains_key("last_updated") {
        obj.insert(
            "last_updated".to_string(),
            Value::String(raw.fetched_at.to_rfc3339()),
        );
    }

    let funding: FundingDetails =
        serde_json::from_value(Value::Object(obj)).map_err(|e| {
            ValidationError::UnexpectedStructure {
                kind: KIND,
                detail: e.to_string(),
            }
        })?;

    check_non_negative(KIND, "county_funding_millions", funding.county_funding_millions)?;
    check_non_negative(
        KIND,
        "federal_funding_millions",
        funding.federal_funding_millions,
    )?;
    if let Some(leverage) = funding.measure_k_leverage_millions {
        check_non_negative(KIND, "measure_k_leverage_millions", leverage)?;
    }

    Ok(RecordBody::FundingDetails(funding))
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
