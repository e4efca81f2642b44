//! Wire format of the lock controller's pass endpoints.

use crate::morse;
use crate::pass::{Credential, Method, MorseCredential, Pass, PassType};
use crate::timestamp::{format_timestamp, parse_optional, parse_timestamp};
use crate::{DoorPassError, Result};
use serde::{Deserialize, Serialize};

/// A pass record as stored by the lock.
///
/// Morse records carry the full knock sequence in `knock_password` and the
/// six-bit binary form in `password`. QR records carry the opaque token in
/// `password`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRecord {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type", default)]
    pub pass_type: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub creation_time: Option<String>,
    #[serde(default)]
    pub expiration_time: Option<String>,
    #[serde(default)]
    pub deletion_time: Option<String>,
    #[serde(default)]
    pub knock_password: Option<String>,
}

impl WireRecord {
    /// Map the record into a [`Pass`] of `method`.
    pub fn into_pass(self, method: Method) -> Result<Pass> {
        if self.id == u64::MAX {
            return Err(DoorPassError::InvalidInput(format!(
                "record id {} leaves no room for a next id",
                self.id
            )));
        }
        let expiry = self.expiration_time.as_deref().ok_or_else(|| {
            DoorPassError::InvalidInput(format!("record {} has no expiration_time", self.id))
        })?;
        let expiry_time = parse_timestamp(expiry)?;
        let deletion_time = parse_optional(self.deletion_time.as_deref())?;

        let pass_type = match self.pass_type.as_deref() {
            Some(raw) => raw.parse::<PassType>()?,
            None => PassType::OneTime,
        };

        let credential = match method {
            Method::Morse => {
                let sequence = self.knock_password.ok_or_else(|| {
                    DoorPassError::InvalidInput(format!("morse record {} has no knock_password", self.id))
                })?;
                morse_credential(sequence, self.password)
            }
            Method::Qr => Credential::Qr {
                password: self.password,
                creation_time: parse_optional(self.creation_time.as_deref())?,
            },
            Method::Voice => Credential::None,
        };

        Ok(Pass {
            id: self.id,
            name: self.name,
            pass_type,
            expiry_time,
            deletion_time,
            credential,
        })
    }
}

/// Build the Morse credential from stored fields.
///
/// The stored binary password is authoritative. A stored sequence that no
/// longer encodes keeps its raw form with the last symbol dropped for display.
fn morse_credential(sequence: String, binary: Option<String>) -> Credential {
    let encoded = morse::encode(&sequence).ok();
    let knock_password = match &encoded {
        Some(encoded) => encoded.knock.clone(),
        None => {
            let mut chars = sequence.chars();
            chars.next_back();
            chars.as_str().trim_end().to_string()
        }
    };
    let binary_password = binary
        .or_else(|| encoded.map(|encoded| encoded.binary))
        .unwrap_or_default();

    Credential::Morse(MorseCredential {
        morse_password: sequence,
        binary_password,
        knock_password,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadRequest {
    pub method: Method,
}

/// Full record sent on creation.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRequest {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub pass_type: PassType,
    pub expiration_time: String,
    pub method: Method,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knock_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl CreateRequest {
    pub fn new(method: Method, pass: &Pass) -> Self {
        let morse = pass.morse().filter(|_| method == Method::Morse);
        Self {
            id: pass.id,
            name: pass.name.clone(),
            pass_type: pass.pass_type,
            expiration_time: format_timestamp(pass.expiry_time),
            method,
            knock_password: morse.map(|m| m.morse_password.clone()),
            password: morse.map(|m| m.binary_password.clone()),
        }
    }
}

/// Edit payload. `None` fields serialize as `null` and mean "unchanged".
///
/// The Morse fields are omitted entirely for other methods.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateRequest {
    pub id: u64,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub pass_type: Option<PassType>,
    pub expiration_time: Option<String>,
    pub method: Method,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knock_password: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<Option<String>>,
}

fn changed<T: PartialEq>(confirmed: Option<T>, edited: T) -> Option<T> {
    match confirmed {
        Some(old) if old == edited => None,
        _ => Some(edited),
    }
}

impl UpdateRequest {
    /// Diff `edited` against the last server-confirmed version of the pass.
    ///
    /// Without a confirmed version every field is sent.
    pub fn diff(method: Method, confirmed: Option<&Pass>, edited: &Pass) -> Self {
        let mut request = Self {
            id: edited.id,
            name: changed(confirmed.map(|p| &p.name), &edited.name).cloned(),
            pass_type: changed(confirmed.map(|p| p.pass_type), edited.pass_type),
            expiration_time: changed(confirmed.map(|p| p.expiry_time), edited.expiry_time)
                .map(format_timestamp),
            method,
            knock_password: None,
            password: None,
        };

        if method == Method::Morse {
            let old = confirmed.and_then(Pass::morse);
            let new = edited.morse();
            request.knock_password = Some(changed(
                old.map(|m| m.morse_password.as_str()),
                new.map_or("", |m| m.morse_password.as_str()),
            )
            .map(str::to_string));
            request.password = Some(changed(
                old.map(|m| m.binary_password.as_str()),
                new.map_or("", |m| m.binary_password.as_str()),
            )
            .map(str::to_string));
        }

        request
    }

    /// Whether the request changes nothing.
    pub fn is_noop(&self) -> bool {
        self.name.is_none()
            && self.pass_type.is_none()
            && self.expiration_time.is_none()
            && self.knock_password.as_ref().map_or(true, Option::is_none)
            && self.password.as_ref().map_or(true, Option::is_none)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteRequest {
    pub id: u64,
    pub method: Method,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn morse_record() -> WireRecord {
        serde_json::from_value(json!({
            "id": 3,
            "name": "Courier",
            "type": "multiple-pass",
            "password": "010100",
            "knock_password": ". ._ . ._ . . .",
            "creation_time": "2025-05-10T08:00",
            "expiration_time": "2025-05-20T18:30",
            "deletion_time": null
        }))
        .unwrap()
    }

    #[test]
    fn test_morse_record_mapping() {
        let pass = morse_record().into_pass(Method::Morse).unwrap();
        assert_eq!(pass.id, 3);
        assert_eq!(format_timestamp(pass.expiry_time), "2025-05-20T18:30");
        assert!(pass.deletion_time.is_none());

        let morse = pass.morse().unwrap();
        assert_eq!(morse.morse_password, ". ._ . ._ . . .");
        assert_eq!(morse.knock_password, ". ._ . ._ . .");
        assert_eq!(morse.binary_password, "010100");
    }

    #[test]
    fn test_morse_record_with_undecodable_sequence() {
        let mut record = morse_record();
        record.knock_password = Some("._._..".to_string());
        let pass = record.into_pass(Method::Morse).unwrap();
        let morse = pass.morse().unwrap();
        assert_eq!(morse.knock_password, "._._.");
        assert_eq!(morse.binary_password, "010100");
    }

    #[test]
    fn test_qr_record_mapping() {
        let record: WireRecord = serde_json::from_value(json!({
            "id": 1,
            "name": "Guest",
            "type": "multiple-use",
            "password": "a1b2c3",
            "creation_time": "2025-05-10T08:00",
            "expiration_time": "2025-05-20T18:30:00",
            "deletion_time": "2025-05-11 09:15:00"
        }))
        .unwrap();

        let pass = record.into_pass(Method::Qr).unwrap();
        assert_eq!(pass.pass_type, PassType::MultiplePass);
        assert!(pass.deletion_time.is_some());
        match pass.credential {
            Credential::Qr {
                password,
                creation_time,
            } => {
                assert_eq!(password.as_deref(), Some("a1b2c3"));
                assert!(creation_time.is_some());
            }
            other => panic!("unexpected credential {:?}", other),
        }
    }

    #[test]
    fn test_bad_expiry_rejected() {
        let mut record = morse_record();
        record.expiration_time = Some("soon".to_string());
        assert!(record.into_pass(Method::Morse).is_err());

        let mut record = morse_record();
        record.expiration_time = None;
        assert!(record.into_pass(Method::Morse).is_err());
    }

    #[test]
    fn test_create_request_shape() {
        let morse_pass = morse_record().into_pass(Method::Morse).unwrap();
        let body = serde_json::to_value(CreateRequest::new(Method::Morse, &morse_pass)).unwrap();
        assert_eq!(body["method"], "morse");
        assert_eq!(body["type"], "multiple-pass");
        assert_eq!(body["knock_password"], ". ._ . ._ . . .");
        assert_eq!(body["password"], "010100");

        let qr_pass = Pass {
            credential: Credential::None,
            ..morse_pass
        };
        let body = serde_json::to_value(CreateRequest::new(Method::Qr, &qr_pass)).unwrap();
        assert_eq!(body["expiration_time"], "2025-05-20T18:30");
        assert!(body.get("knock_password").is_none());
        assert!(body.get("password").is_none());
    }

    #[test]
    fn test_update_diff_nulls_unchanged_fields() {
        let confirmed = morse_record().into_pass(Method::Qr).unwrap();
        let mut edited = confirmed.clone();
        edited.name = "Courier (late)".to_string();

        let request = UpdateRequest::diff(Method::Qr, Some(&confirmed), &edited);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "id": 3,
                "name": "Courier (late)",
                "type": null,
                "expiration_time": null,
                "method": "qr"
            })
        );
        assert!(!request.is_noop());
    }

    #[test]
    fn test_update_diff_morse_fields() {
        let confirmed = morse_record().into_pass(Method::Morse).unwrap();
        let mut edited = confirmed.clone();
        edited.credential =
            Credential::Morse(MorseCredential::from_sequence(". ._ . . ._ . .").unwrap());

        let body =
            serde_json::to_value(UpdateRequest::diff(Method::Morse, Some(&confirmed), &edited))
                .unwrap();
        assert_eq!(body["name"], json!(null));
        assert_eq!(body["knock_password"], ". ._ . . ._ . .");
        assert_eq!(body["password"], "010010");

        let unchanged = UpdateRequest::diff(Method::Morse, Some(&confirmed), &confirmed);
        assert!(unchanged.is_noop());
        let body = serde_json::to_value(&unchanged).unwrap();
        assert_eq!(body["knock_password"], json!(null));
    }

    #[test]
    fn test_update_without_confirmed_sends_everything() {
        let edited = morse_record().into_pass(Method::Qr).unwrap();
        let request = UpdateRequest::diff(Method::Qr, None, &edited);
        assert_eq!(request.name.as_deref(), Some("Courier"));
        assert_eq!(request.pass_type, Some(PassType::MultiplePass));
        assert_eq!(request.expiration_time.as_deref(), Some("2025-05-20T18:30"));
    }

    #[test]
    fn test_delete_and_load_bodies() {
        let body = serde_json::to_value(DeleteRequest {
            id: 9,
            method: Method::Voice,
        })
        .unwrap();
        assert_eq!(body, json!({"id": 9, "method": "voice"}));

        let body = serde_json::to_value(LoadRequest { method: Method::Qr }).unwrap();
        assert_eq!(body, json!({"method": "qr"}));
    }
}
