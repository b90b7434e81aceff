pub mod health;
pub mod tasks;
pub mod users;

use serde_json::Value;

use crate::error::Error;

/// Decode a JSON body into a typed payload. Handlers take `Json<Value>` and
/// decode here so a bad field shape gets the standard envelope 400 rather
/// than the extractor's plain-text rejection.
pub(crate) fn parse_body<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, Error> {
    serde_json::from_value(body).map_err(|e| Error::Validation(e.to_string()))
}
