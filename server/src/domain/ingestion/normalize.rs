//! Lead field normalization
//!
//! Pure mapping from provider field names to canonical contact fields. Both
//! webhook surfaces funnel through [`normalize_contact`]; the per-platform
//! alias tables absorb the naming drift between Facebook lead forms and
//! website form builders. Unknown fields are never dropped: the caller
//! passes the verbatim provider payload through as `raw_payload`.

use serde_json::{Map, Value};

use crate::data::sqlite::repositories::NewLeadData;
use crate::utils::time::parse_flexible_timestamp;

/// Where a lead came from; selects the alias table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePlatform {
    Facebook,
    Website,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CanonicalField {
    Email,
    Phone,
    FirstName,
    LastName,
    FullName,
    Company,
    JobTitle,
    City,
    State,
    Country,
    ZipCode,
    Message,
    ConsentTime,
}

fn canonical_field(platform: SourcePlatform, name: &str) -> Option<CanonicalField> {
    use CanonicalField::*;

    let name = name.trim().to_lowercase();
    let shared = match name.as_str() {
        "email" | "work_email" | "business_email" => Some(Email),
        "phone" | "phone_number" | "mobile_phone" => Some(Phone),
        "first_name" => Some(FirstName),
        "last_name" => Some(LastName),
        "full_name" => Some(FullName),
        "company" | "company_name" => Some(Company),
        "job_title" => Some(JobTitle),
        "city" => Some(City),
        "state" => Some(State),
        "country" => Some(Country),
        "zip" | "zip_code" | "postal_code" => Some(ZipCode),
        "message" => Some(Message),
        "consent_time" => Some(ConsentTime),
        _ => None,
    };
    if shared.is_some() {
        return shared;
    }

    // Website form builders use a looser vocabulary
    if platform == SourcePlatform::Website {
        return match name.as_str() {
            "e-mail" => Some(Email),
            "cell_phone" | "telephone" => Some(Phone),
            "firstname" | "fname" => Some(FirstName),
            "lastname" | "lname" => Some(LastName),
            "fullname" => Some(FullName),
            "consent_timestamp" => Some(ConsentTime),
            _ => None,
        };
    }
    None
}

/// Split a full name: first token is the first name, the remainder (joined
/// with single spaces) is the last name.
fn split_full_name(full: &str) -> (Option<String>, Option<String>) {
    let mut tokens = full.split_whitespace();
    let first = tokens.next().map(String::from);
    let rest: Vec<&str> = tokens.collect();
    let last = if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    };
    (first, last)
}

/// Map provider fields to a canonical contact record
///
/// `fields` preserves provider order; the first value seen for a canonical
/// field wins. Name fields are made consistent in both directions: a lone
/// `full_name` is split into first/last, and first+last are joined into
/// `full_name` with a single space.
pub fn normalize_contact(
    platform: SourcePlatform,
    fields: &[(String, String)],
    raw_payload: String,
) -> NewLeadData {
    let mut data = NewLeadData {
        raw_payload,
        ..Default::default()
    };

    for (name, value) in fields {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let Some(field) = canonical_field(platform, name) else {
            continue;
        };

        let slot = match field {
            CanonicalField::Email => &mut data.email,
            CanonicalField::Phone => &mut data.phone,
            CanonicalField::FirstName => &mut data.first_name,
            CanonicalField::LastName => &mut data.last_name,
            CanonicalField::FullName => &mut data.full_name,
            CanonicalField::Company => &mut data.company,
            CanonicalField::JobTitle => &mut data.job_title,
            CanonicalField::City => &mut data.city,
            CanonicalField::State => &mut data.state,
            CanonicalField::Country => &mut data.country,
            CanonicalField::ZipCode => &mut data.zip_code,
            CanonicalField::Message => &mut data.message,
            CanonicalField::ConsentTime => {
                if data.consent_at.is_none() {
                    data.consent_at = parse_flexible_timestamp(value);
                }
                continue;
            }
        };
        if slot.is_none() {
            *slot = Some(value.to_string());
        }
    }

    // Keep name fields consistent in both directions
    if data.full_name.is_none() {
        let joined: Vec<&str> = [data.first_name.as_deref(), data.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if !joined.is_empty() {
            data.full_name = Some(joined.join(" "));
        }
    } else if data.first_name.is_none() && data.last_name.is_none() {
        if let Some(full) = data.full_name.clone() {
            let (first, last) = split_full_name(&full);
            data.first_name = first;
            data.last_name = last;
        }
    }

    data
}

/// Flatten a website `answers` object into ordered (name, value) pairs
///
/// Non-string scalars are stringified; nested values are ignored.
pub fn website_fields(answers: &Map<String, Value>) -> Vec<(String, String)> {
    answers
        .iter()
        .filter_map(|(name, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((name.clone(), value))
        })
        .collect()
}
