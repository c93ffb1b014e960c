use bitcoin::{Amount, BlockHash, ScriptBuf};

use crate::error::CoreError;
use crate::rpc::types::TxOutInfo;

#[derive(serde::Deserialize)]
struct TxOutResponse {
    #[serde(rename = "bestblock")]
    best_block: BlockHash,
    confirmations: u64,
    value: serde_json::Value,
    #[serde(rename = "scriptPubKey")]
    script_pub_key: serde_json::Value,
    #[serde(default)]
    coinbase: bool,
}

/// `gettxout` answers `null` for spent or unknown outpoints.
pub(super) fn parse_gettxout_result(raw: serde_json::Value) -> Result<Option<TxOutInfo>, CoreError> {
    if raw.is_null() {
        return Ok(None);
    }

    let response: TxOutResponse = serde_json::from_value(raw)
        .map_err(|e| CoreError::InvalidData(format!("invalid gettxout result: {e}")))?;

    let value = parse_btc_amount(&response.value)?;
    let script_pub_key = parse_script_pubkey_from_json(&response.script_pub_key)?;
    let address = response
        .script_pub_key
        .get("address")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned);

    Ok(Some(TxOutInfo {
        best_block: response.best_block,
        confirmations: response.confirmations,
        value,
        script_pub_key,
        address,
        coinbase: response.coinbase,
    }))
}

/// Decode a typed result, naming the method in the error.
pub(super) fn decode_result<T>(method: &str, raw: serde_json::Value) -> Result<T, CoreError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(raw)
        .map_err(|e| CoreError::InvalidData(format!("invalid {method} result: {e}")))
}

fn parse_script_pubkey_from_json(spk: &serde_json::Value) -> Result<ScriptBuf, CoreError> {
    let hex_str = spk
        .get("hex")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| CoreError::InvalidData("missing hex in scriptPubKey".into()))?;
    ScriptBuf::from_hex(hex_str)
        .map_err(|e| CoreError::InvalidData(format!("invalid scriptPubKey hex: {e}")))
}

/// Parse a BTC amount from a JSON value.
///
/// Number values are parsed via `Amount::from_float_in` to support scientific
/// notation, while string values are parsed via `Amount::from_str_in`.
pub(super) fn parse_btc_amount(value: &serde_json::Value) -> Result<Amount, CoreError> {
    match value {
        serde_json::Value::Number(n) => {
            let parsed = n
                .as_f64()
                .ok_or_else(|| CoreError::InvalidData(format!("invalid BTC amount `{value}`")))?;
            Amount::from_float_in(parsed, bitcoin::Denomination::Bitcoin)
                .map_err(|e| CoreError::InvalidData(format!("invalid BTC amount `{value}`: {e}")))
        }
        serde_json::Value::String(s) => Amount::from_str_in(s, bitcoin::Denomination::Bitcoin)
            .map_err(|e| CoreError::InvalidData(format!("invalid BTC amount `{s}`: {e}"))),
        _ => Err(CoreError::InvalidData(format!(
            "expected numeric BTC amount, got: {value}"
        ))),
    }
}
