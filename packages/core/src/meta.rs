// ABOUTME: Canonical form submission metadata
// ABOUTME: Normalizes legacy and current signature-flag spellings into one structure

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::lenient::{parse_datetime, parse_json_value, truthy};
use crate::types::ParticipantRole;

const NEEDS_SELLER: &str = "needsSignatureFromSeller";
const NEEDS_BUYER: &str = "needsSignatureFromBuyer";
const LEGACY_NEEDS_SELLER: &str = "needSignatureFromSeller";
const LEGACY_NEEDS_BUYER: &str = "needSignatureFromBuyer";
const SIGNATURES: &str = "signatures";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEntry {
    /// Signature image, usually a data URL
    pub image: String,
    pub signed_at: Option<DateTime<Utc>>,
}

impl SignatureEntry {
    pub fn new(image: impl Into<String>, signed_at: DateTime<Utc>) -> Self {
        Self {
            image: image.into(),
            signed_at: Some(signed_at),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signatures {
    pub seller: Option<SignatureEntry>,
    pub buyer: Option<SignatureEntry>,
}

/// Signature requirements snapshot and collected signatures of a form submission.
///
/// Both `needSignatureFrom*` and `needsSignatureFrom*` are accepted on read;
/// only the latter is written back. Unknown keys are preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormMeta {
    pub needs_signature_from_seller: bool,
    pub needs_signature_from_buyer: bool,
    pub signatures: Signatures,
    pub extra: Map<String, Value>,
}

impl FormMeta {
    pub fn new(needs_seller: bool, needs_buyer: bool) -> Self {
        Self {
            needs_signature_from_seller: needs_seller,
            needs_signature_from_buyer: needs_buyer,
            ..Default::default()
        }
    }

    pub fn from_value(raw: Value) -> Self {
        let mut map: Map<String, Value> = parse_json_value(raw);

        let needs_seller = truthy(map.get(NEEDS_SELLER)) || truthy(map.get(LEGACY_NEEDS_SELLER));
        let needs_buyer = truthy(map.get(NEEDS_BUYER)) || truthy(map.get(LEGACY_NEEDS_BUYER));
        for key in [NEEDS_SELLER, NEEDS_BUYER, LEGACY_NEEDS_SELLER, LEGACY_NEEDS_BUYER] {
            map.remove(key);
        }

        let signatures = map
            .remove(SIGNATURES)
            .map(|raw| {
                let sigs: Map<String, Value> = parse_json_value(raw);
                Signatures {
                    seller: read_entry(&sigs, "seller"),
                    buyer: read_entry(&sigs, "buyer"),
                }
            })
            .unwrap_or_default();

        Self {
            needs_signature_from_seller: needs_seller,
            needs_signature_from_buyer: needs_buyer,
            signatures,
            extra: map,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = self.extra.clone();
        map.insert(NEEDS_SELLER.to_string(), Value::Bool(self.needs_signature_from_seller));
        map.insert(NEEDS_BUYER.to_string(), Value::Bool(self.needs_signature_from_buyer));

        let mut sigs = Map::new();
        write_entry(&mut sigs, "seller", self.signatures.seller.as_ref());
        write_entry(&mut sigs, "buyer", self.signatures.buyer.as_ref());
        map.insert(SIGNATURES.to_string(), Value::Object(sigs));

        Value::Object(map)
    }

    pub fn requires(&self, role: ParticipantRole) -> bool {
        match role {
            ParticipantRole::Seller => self.needs_signature_from_seller,
            ParticipantRole::Buyer => self.needs_signature_from_buyer,
            ParticipantRole::Admin => false,
        }
    }

    pub fn required_roles(&self) -> Vec<ParticipantRole> {
        [ParticipantRole::Seller, ParticipantRole::Buyer]
            .into_iter()
            .filter(|role| self.requires(*role))
            .collect()
    }

    pub fn signature(&self, role: ParticipantRole) -> Option<&SignatureEntry> {
        match role {
            ParticipantRole::Seller => self.signatures.seller.as_ref(),
            ParticipantRole::Buyer => self.signatures.buyer.as_ref(),
            ParticipantRole::Admin => None,
        }
    }

    pub fn signed_roles(&self) -> Vec<ParticipantRole> {
        [ParticipantRole::Seller, ParticipantRole::Buyer]
            .into_iter()
            .filter(|role| self.signature(*role).is_some())
            .collect()
    }

    /// Stores a signature; returns false for roles that cannot sign forms
    pub fn set_signature(&mut self, role: ParticipantRole, entry: SignatureEntry) -> bool {
        match role {
            ParticipantRole::Seller => self.signatures.seller = Some(entry),
            ParticipantRole::Buyer => self.signatures.buyer = Some(entry),
            ParticipantRole::Admin => return false,
        }
        true
    }

    pub fn clear_signature(&mut self, role: ParticipantRole) {
        match role {
            ParticipantRole::Seller => self.signatures.seller = None,
            ParticipantRole::Buyer => self.signatures.buyer = None,
            ParticipantRole::Admin => {}
        }
    }

    pub fn clear_signatures(&mut self) {
        self.signatures = Signatures::default();
    }

    pub fn has_any_signature(&self) -> bool {
        self.signatures.seller.is_some() || self.signatures.buyer.is_some()
    }

    /// True when every role flagged as required has signed
    pub fn all_required_present(&self) -> bool {
        self.required_roles()
            .into_iter()
            .all(|role| self.signature(role).is_some())
    }
}

fn read_entry(sigs: &Map<String, Value>, role: &str) -> Option<SignatureEntry> {
    let image = match sigs.get(role)? {
        Value::String(s) => s.clone(),
        Value::Object(obj) => obj
            .get("image")
            .or_else(|| obj.get("url"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    };
    if image.trim().is_empty() {
        return None;
    }

    let signed_at = sigs
        .get(&format!("{}Date", role))
        .and_then(Value::as_str)
        .and_then(parse_datetime);

    Some(SignatureEntry { image, signed_at })
}

fn write_entry(sigs: &mut Map<String, Value>, role: &str, entry: Option<&SignatureEntry>) {
    if let Some(entry) = entry {
        sigs.insert(role.to_string(), Value::String(entry.image.clone()));
        if let Some(at) = entry.signed_at {
            sigs.insert(format!("{}Date", role), Value::String(at.to_rfc3339()));
        }
    }
}

impl Serialize for FormMeta {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FormMeta {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(FormMeta::from_value(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_both_spellings_are_normalized() {
        let legacy = FormMeta::from_value(json!({"needSignatureFromSeller": true}));
        let current = FormMeta::from_value(json!({"needsSignatureFromSeller": "true"}));
        assert!(legacy.needs_signature_from_seller);
        assert_eq!(legacy, current);

        let written = legacy.to_value();
        assert_eq!(written.get(LEGACY_NEEDS_SELLER), None);
        assert_eq!(written.get(NEEDS_SELLER), Some(&json!(true)));
    }

    #[test]
    fn test_signatures_read_with_dates() {
        let meta = FormMeta::from_value(json!({
            "needsSignatureFromBuyer": true,
            "signatures": {"buyer": "data:image/png;base64,AAA", "buyerDate": "2024-03-01T09:00:00Z"},
            "note": "keep me"
        }));
        let buyer = meta.signature(ParticipantRole::Buyer).unwrap();
        assert_eq!(buyer.image, "data:image/png;base64,AAA");
        assert!(buyer.signed_at.is_some());
        assert!(meta.all_required_present());
        assert_eq!(meta.extra.get("note"), Some(&json!("keep me")));
    }

    #[test]
    fn test_malformed_meta_defaults() {
        let meta = FormMeta::from_value(json!("{not json"));
        assert_eq!(meta, FormMeta::default());
        assert!(meta.all_required_present());
    }

    #[test]
    fn test_empty_signature_counts_as_missing() {
        let meta = FormMeta::from_value(json!({
            "needsSignatureFromSeller": true,
            "signatures": {"seller": ""}
        }));
        assert!(!meta.has_any_signature());
        assert!(!meta.all_required_present());
    }

    #[test]
    fn test_admin_cannot_hold_form_signature() {
        let mut meta = FormMeta::new(true, false);
        assert!(!meta.set_signature(ParticipantRole::Admin, SignatureEntry::new("x", Utc::now())));
        assert!(meta.set_signature(ParticipantRole::Seller, SignatureEntry::new("x", Utc::now())));
        assert_eq!(meta.signed_roles(), vec![ParticipantRole::Seller]);
        meta.clear_signature(ParticipantRole::Seller);
        assert!(!meta.has_any_signature());
    }
}
