// [libs/domain/ledger/src/entry.rs]
use chrono::{DateTime, Utc};
use gateway_error::{ErrorKind, GatewayError};
use serde::{Deserialize, Serialize};

/// How a line's cost was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingMethod {
    ProviderReported,
    ByteEstimated,
    Reconciled,
}

/// Schema version 2 cost ledger line. Costs are decimal
/// strings in micro-USD — never floats, so summation stays exact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub schema_version: u32,
    pub timestamp: DateTime<Utc>,
    pub trace_id: String,
    pub agent: String,
    pub provider: String,
    pub model: String,
    pub project_id: String,
    pub phase_id: String,
    pub sprint_id: String,
    pub tenant_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub nft_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pool_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ensemble_id: Option<String>,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub reasoning_tokens: u64,
    pub input_cost_micro: String,
    pub output_cost_micro: String,
    pub reasoning_cost_micro: String,
    pub total_cost_micro: String,
    pub price_table_version: String,
    pub billing_method: BillingMethod,
    #[serde(default)]
    pub crc32: String,
}

/// A single line must not exceed this many bytes so POSIX `O_APPEND` is
/// atomic on the common page-aligned filesystems this runs on.
pub const MAX_ENTRY_BYTES: usize = 4096;

impl LedgerEntry {
    /// Validates the cost decomposition invariant
    /// (`total = input + output + reasoning`) and that every cost field
    /// parses as a non-negative decimal integer.
    pub fn validate(&self) -> Result<(), GatewayError> {
        let input = parse_micro(&self.input_cost_micro)?;
        let output = parse_micro(&self.output_cost_micro)?;
        let reasoning = parse_micro(&self.reasoning_cost_micro)?;
        let total = parse_micro(&self.total_cost_micro)?;
        if input + output + reasoning != total {
            return Err(GatewayError::new(
                    ErrorKind::BudgetInvalid,
                    "total_cost_micro does not equal input + output + reasoning",
            ));
        }
        Ok(())
    }

    /// CRC32 hex (lowercase, 8 chars) over the entry with the `crc32`
    /// field itself removed — not merely blanked — from the JSON object,
    /// per the wire format's documented canonicalization.
    pub fn compute_crc32(&self) -> String {
        let mut value = serde_json::to_value(self).expect("ledger entry always serializes");
        if let Some(obj) = value.as_object_mut() {
            obj.remove("crc32");
        }
        let bytes = serde_json::to_vec(&value).expect("ledger entry value always serializes");
        format!("{:08x}", crc32fast::hash(&bytes))
    }

    pub fn stamp_crc32(&mut self) {
        self.crc32 = self.compute_crc32();
    }

    pub fn verify_crc32(&self) -> bool {
        self.compute_crc32() == self.crc32
    }

    pub fn to_line(&self) -> Result<String, GatewayError> {
        let line = serde_json::to_string(self).map_err(|e| GatewayError::new(ErrorKind::Io, e.to_string()))?;
        if line.as_bytes().len() > MAX_ENTRY_BYTES {
            return Err(GatewayError::new(
                    ErrorKind::BudgetInvalid,
                    format!("ledger entry serializes to {} bytes, over the {} byte cap", line.len(), MAX_ENTRY_BYTES),
            ));
        }
        Ok(line)
    }

    pub fn total_cost_micro_value(&self) -> Result<i128, GatewayError> {
        parse_micro(&self.total_cost_micro)
    }
}

fn parse_micro(value: &str) -> Result<i128, GatewayError> {
    value
    .parse::<i128>()
    .map_err(|_| GatewayError::new(ErrorKind::BudgetInvalid, format!("'{value}' is not a decimal integer")))
    .and_then(|v| {
            if v < 0 {
                Err(GatewayError::new(ErrorKind::BudgetInvalid, format!("'{value}' must be non-negative")))
            } else {
                Ok(v)
            }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LedgerEntry {
        LedgerEntry {
            schema_version: 2,
            timestamp: Utc::now(),
            trace_id: "trace-1".into(),
            agent: "agent-1".into(),
            provider: "openai".into(),
            model: "gpt-x".into(),
            project_id: "proj".into(),
            phase_id: "phase".into(),
            sprint_id: "sprint".into(),
            tenant_id: "tenant-a".into(),
            nft_id: None,
            pool_id: None,
            ensemble_id: None,
            prompt_tokens: 100,
            completion_tokens: 50,
            reasoning_tokens: 0,
            input_cost_micro: "500".into(),
            output_cost_micro: "250".into(),
            reasoning_cost_micro: "0".into(),
            total_cost_micro: "750".into(),
            price_table_version: "v1".into(),
            billing_method: BillingMethod::ProviderReported,
            crc32: String::new(),
        }
    }

    #[test]
    fn crc32_round_trips() {
        let mut entry = sample();
        entry.stamp_crc32();
        assert!(entry.verify_crc32());
    }

    #[test]
    fn tampering_breaks_crc32() {
        let mut entry = sample();
        entry.stamp_crc32();
        entry.total_cost_micro = "999".into();
        assert!(!entry.verify_crc32());
    }

    #[test]
    fn rejects_inconsistent_total() {
        let mut entry = sample();
        entry.total_cost_micro = "999".into();
        assert!(entry.validate().is_err());
    }
}
