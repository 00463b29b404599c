//! User profile returned by the UAE PASS userinfo endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity attributes of the signed-in user.
///
/// Every field is optional; which ones are populated depends on the
/// account type and requested scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Subject identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// UAE PASS account UUID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Emirates ID number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idn: Option<String>,
    /// First name (English).
    #[serde(rename = "firstnameEN", default, skip_serializing_if = "Option::is_none")]
    pub first_name_en: Option<String>,
    /// First name (Arabic).
    #[serde(rename = "firstnameAR", default, skip_serializing_if = "Option::is_none")]
    pub first_name_ar: Option<String>,
    /// Last name (English).
    #[serde(rename = "lastnameEN", default, skip_serializing_if = "Option::is_none")]
    pub last_name_en: Option<String>,
    /// Last name (Arabic).
    #[serde(rename = "lastnameAR", default, skip_serializing_if = "Option::is_none")]
    pub last_name_ar: Option<String>,
    /// Full name (English).
    #[serde(rename = "fullnameEN", default, skip_serializing_if = "Option::is_none")]
    pub full_name_en: Option<String>,
    /// Full name (Arabic).
    #[serde(rename = "fullnameAR", default, skip_serializing_if = "Option::is_none")]
    pub full_name_ar: Option<String>,
    /// Nationality (English).
    #[serde(rename = "nationalityEN", default, skip_serializing_if = "Option::is_none")]
    pub nationality_en: Option<String>,
    /// Nationality (Arabic).
    #[serde(rename = "nationalityAR", default, skip_serializing_if = "Option::is_none")]
    pub nationality_ar: Option<String>,
    /// Gender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    /// Mobile number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    /// Email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Account type (e.g. `SOP1`, `SOP2`, `SOP3`).
    #[serde(rename = "userType", default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
    /// Any other attributes the provider returned.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Profile {
    /// Full name in the requested language, falling back to the other one.
    #[must_use]
    pub fn display_name(&self, language: &str) -> Option<&str> {
        let (preferred, fallback) = if language.eq_ignore_ascii_case("ar") {
            (&self.full_name_ar, &self.full_name_en)
        } else {
            (&self.full_name_en, &self.full_name_ar)
        };
        preferred.as_deref().or(fallback.as_deref())
    }
}
