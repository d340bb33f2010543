//! Normalization and similarity rules used to decide whether two registrations are the same person.
//!
//! Comparisons happen in a fixed order: phone, email, full name, then address similarity. The first
//! rule that matches determines the reported [`DuplicateReason`].

use std::fmt;

use crate::db::models::survey_responses::SurveyContact;

/// Default minimum address similarity for two addresses to count as the same
pub const DEFAULT_ADDRESS_SIMILARITY_THRESHOLD: f64 = 0.9;

const SIMILARITY_EPSILON: f64 = 1e-9;

/// Strip everything but digits and fold the `66` country code into a leading `0`.
///
/// `+66 81-234-5678` and `081 234 5678` both normalize to `0812345678`.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.strip_prefix("66") {
        Some(rest) if digits.len() >= 10 => format!("0{rest}"),
        _ => digits,
    }
}

/// Trim, collapse internal whitespace runs to one space, and lowercase.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Address components in their canonical order
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressParts<'a> {
    pub house_number: &'a str,
    pub village_or_building: &'a str,
    pub moo: &'a str,
    pub soi: &'a str,
    pub road: &'a str,
    pub subdistrict: &'a str,
    pub district: &'a str,
    pub province: &'a str,
    pub postcode: &'a str,
}

impl<'a> AddressParts<'a> {
    fn labelled(&self) -> [(&'static str, &'a str); 9] {
        [
            ("บ้านเลขที่", self.house_number),
            ("หมู่บ้าน/อาคาร", self.village_or_building),
            ("หมู่", self.moo),
            ("ซอย", self.soi),
            ("ถนน", self.road),
            ("ตำบล", self.subdistrict),
            ("อำเภอ", self.district),
            ("จังหวัด", self.province),
            ("รหัสไปรษณีย์", self.postcode),
        ]
    }
}

impl<'a> From<&'a SurveyContact> for AddressParts<'a> {
    fn from(contact: &'a SurveyContact) -> Self {
        Self {
            house_number: &contact.house_number,
            village_or_building: &contact.village_or_building,
            moo: &contact.moo,
            soi: &contact.soi,
            road: &contact.road,
            subdistrict: &contact.subdistrict,
            district: &contact.district,
            province: &contact.province,
            postcode: &contact.postcode,
        }
    }
}

/// Normalized single-string form of an address.
///
/// Each non-empty component is written as `label value` and joined with single spaces; empty
/// components are left out entirely. An address with no components yields an empty string.
pub fn canonical_address(parts: AddressParts<'_>) -> String {
    let joined = parts
        .labelled()
        .iter()
        .filter_map(|(label, value)| {
            let value = value.trim();
            (!value.is_empty()).then(|| format!("{label} {value}"))
        })
        .collect::<Vec<_>>()
        .join(" ");
    normalize_text(&joined)
}

/// Character-level edit distance (insert, delete, substitute all cost 1)
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// `1 - distance / longer_length`. Identical strings (including two empty ones) score 1.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Why a candidate registration was judged to duplicate an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateReason {
    Phone,
    Email,
    Name,
    Address,
}

impl DuplicateReason {
    /// User-facing message shown to the registrant
    pub fn message(self) -> &'static str {
        match self {
            DuplicateReason::Phone => "เบอร์โทรศัพท์นี้ได้ลงทะเบียนแล้ว",
            DuplicateReason::Email => "อีเมลนี้ได้ลงทะเบียนแล้ว",
            DuplicateReason::Name => "ชื่อและนามสกุลนี้ได้ลงทะเบียนแล้ว",
            DuplicateReason::Address => "ที่อยู่นี้ได้ลงทะเบียนแล้ว",
        }
    }
}

impl fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// The normalized identity of one registration, ready for comparison
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactProfile {
    pub phone: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub address: String,
}

impl ContactProfile {
    pub fn new(phone: &str, email: &str, first_name: &str, last_name: &str, address: AddressParts<'_>) -> Self {
        Self {
            phone: normalize_phone(phone),
            email: normalize_text(email),
            first_name: normalize_text(first_name),
            last_name: normalize_text(last_name),
            address: canonical_address(address),
        }
    }

    /// First matching rule between `self` and `other`, or `None` if they look like different people.
    ///
    /// Empty fields never match: two registrations without an email are not duplicates by email,
    /// and a name only matches when both first and last names are present on both sides.
    pub fn duplicate_reason(&self, other: &ContactProfile, address_threshold: f64) -> Option<DuplicateReason> {
        if !self.phone.is_empty() && self.phone == other.phone {
            return Some(DuplicateReason::Phone);
        }
        if !self.email.is_empty() && self.email == other.email {
            return Some(DuplicateReason::Email);
        }

        let names_present =
            [&self.first_name, &self.last_name, &other.first_name, &other.last_name].iter().all(|s| !s.is_empty());
        if names_present && self.first_name == other.first_name && self.last_name == other.last_name {
            return Some(DuplicateReason::Name);
        }

        if !self.address.is_empty()
            && !other.address.is_empty()
            && similarity(&self.address, &other.address) >= address_threshold - SIMILARITY_EPSILON
        {
            return Some(DuplicateReason::Address);
        }

        None
    }
}

impl From<&SurveyContact> for ContactProfile {
    fn from(contact: &SurveyContact) -> Self {
        ContactProfile::new(
            &contact.phone,
            &contact.email,
            &contact.first_name,
            &contact.last_name,
            AddressParts::from(contact),
        )
    }
}
