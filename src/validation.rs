//! Boundary validation.
//!
//! Request bodies derive [`validator::Validate`] and use the rule functions
//! below; query strings and path ids go through the `parse_*` functions. Every
//! failure becomes [`AppError::Validation`] naming the field and the rule, so
//! services only ever see well-formed input.

use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use crate::{
    config::CatalogConfig,
    error::{AppError, AppResult, EntityKind},
    models::book::{BookFilter, BookListQuery},
};

fn rule_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

/// `validator` rule: value is a UUID
pub fn validate_uuid(value: &str) -> Result<(), ValidationError> {
    Uuid::parse_str(value)
        .map(|_| ())
        .map_err(|_| rule_error("uuid", "must be a UUID"))
}

/// `validator` rule: value is an ISO 8601 date or date-time
pub fn validate_iso_date(value: &str) -> Result<(), ValidationError> {
    parse_iso_date(value)
        .map(|_| ())
        .ok_or_else(|| rule_error("iso_date", "must be an ISO 8601 date"))
}

/// Convert `validator` errors into the first failing field and rule
pub fn from_validation_errors(errors: ValidationErrors) -> AppError {
    let mut failures: Vec<(String, String)> = errors
        .field_errors()
        .into_iter()
        .filter_map(|(field, errs)| {
            errs.first().map(|err| {
                let rule = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| err.code.to_string());
                (to_camel_case(&field.to_string()), rule)
            })
        })
        .collect();
    failures.sort();

    match failures.into_iter().next() {
        Some((field, rule)) => AppError::validation(field, rule),
        None => AppError::validation("body", "invalid"),
    }
}

fn to_camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// `YYYY-MM-DD` is read as midnight UTC, anything else must be RFC 3339.
fn parse_iso_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

pub fn parse_uuid(field: &str, value: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| AppError::validation(field, "must be a UUID"))
}

/// Path ids that are not UUIDs cannot name an existing entity.
pub fn parse_path_id(kind: EntityKind, value: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| AppError::not_found(kind, value))
}

pub fn parse_date(field: &str, value: &str) -> AppResult<DateTime<Utc>> {
    parse_iso_date(value).ok_or_else(|| AppError::validation(field, "must be an ISO 8601 date"))
}

pub fn parse_bool(field: &str, value: &str) -> AppResult<bool> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(AppError::validation(field, "must be a boolean")),
    }
}

pub fn parse_positive(field: &str, value: &str) -> AppResult<i64> {
    let number: i64 = value
        .parse()
        .map_err(|_| AppError::validation(field, "must be an integer"))?;
    if number < 1 {
        return Err(AppError::validation(field, "must be at least 1"));
    }
    Ok(number)
}

/// Empty query values count as absent.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Validate a raw book list query
pub fn book_filter(query: BookListQuery, catalog: &CatalogConfig) -> AppResult<BookFilter> {
    let page = present(query.page)
        .map(|p| parse_positive("page", &p))
        .transpose()?
        .unwrap_or(1);

    let limit = present(query.limit)
        .map(|l| parse_positive("limit", &l))
        .transpose()?
        .unwrap_or(catalog.default_page_size);
    if limit > catalog.max_page_size {
        return Err(AppError::validation(
            "limit",
            format!("must be at most {}", catalog.max_page_size),
        ));
    }
    // The row offset must fit in an i64.
    if (page - 1).checked_mul(limit).is_none() {
        return Err(AppError::validation("page", "is out of range"));
    }

    Ok(BookFilter {
        search: present(query.search).map(|s| s.trim().to_string()),
        author_id: present(query.author_id)
            .map(|id| parse_uuid("authorId", &id))
            .transpose()?,
        available: present(query.available)
            .map(|a| parse_bool("available", &a))
            .transpose()?,
        published_from: present(query.published_from)
            .map(|d| parse_date("publishedFrom", &d))
            .transpose()?,
        published_to: present(query.published_to)
            .map(|d| parse_date("publishedTo", &d))
            .transpose()?,
        page,
        limit,
    })
}
