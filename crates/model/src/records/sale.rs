use crate::core::value::{lenient_code, lenient_decimal, lenient_text};
use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Column order of the destination sheet. Names match the source payload.
pub const SALE_COLUMNS: [&str; 11] = [
    "vendas_id",
    "transacao_id",
    "produto_id",
    "valor_liquido",
    "data_conclusao",
    "tipo_pagamento",
    "status_transacao",
    "aluno_id",
    "nome",
    "email",
    "gateway",
];

pub const TRANSACTION_ID_COLUMN: &str = "transacao_id";
pub const COMPLETED_AT_COLUMN: &str = "data_conclusao";

/// A transaction exactly as the source sent it. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawSaleRecord {
    #[serde(rename = "vendas_id", default, deserialize_with = "lenient_text")]
    pub sale_id: Option<String>,
    #[serde(rename = "transacao_id", default, deserialize_with = "lenient_text")]
    pub transaction_id: Option<String>,
    #[serde(rename = "produto_id", default, deserialize_with = "lenient_text")]
    pub product_id: Option<String>,
    #[serde(rename = "valor_liquido", default, deserialize_with = "lenient_decimal")]
    pub net_amount: Option<BigDecimal>,
    #[serde(rename = "data_conclusao", default, deserialize_with = "lenient_text")]
    pub completed_at: Option<String>,
    #[serde(rename = "tipo_pagamento", default, deserialize_with = "lenient_code")]
    pub payment_type: Option<i64>,
    #[serde(rename = "status_transacao", default, deserialize_with = "lenient_code")]
    pub status: Option<i64>,
    #[serde(default, deserialize_with = "lenient_code")]
    pub gateway: Option<i64>,
    #[serde(rename = "aluno_id", default, deserialize_with = "lenient_text")]
    pub student_id: Option<String>,
    #[serde(rename = "nome", default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: Option<String>,
}

impl RawSaleRecord {
    /// Decodes one element of the source's records list. Fails only when
    /// the element is not a JSON object.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        if !value.is_object() {
            return Err(serde::de::Error::custom("sale record is not a JSON object"));
        }
        Self::deserialize(value)
    }
}

/// A validated transaction, ready to be carried into the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub sale_id: Option<String>,
    pub transaction_id: String,
    pub product_id: Option<String>,
    pub net_amount: Option<BigDecimal>,
    pub completed_at: NaiveDateTime,
    pub payment_type: i64,
    pub status: i64,
    pub gateway: i64,
    pub student_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl SaleRecord {
    /// Renders the record as sheet cells in `SALE_COLUMNS` order.
    pub fn to_row(&self, timestamp_format: &str) -> Vec<String> {
        fn cell(v: &Option<String>) -> String {
            v.clone().unwrap_or_default()
        }

        vec![
            cell(&self.sale_id),
            self.transaction_id.clone(),
            cell(&self.product_id),
            self.net_amount
                .as_ref()
                .map(|a| a.to_string())
                .unwrap_or_default(),
            self.completed_at.format(timestamp_format).to_string(),
            self.payment_type.to_string(),
            self.status.to_string(),
            cell(&self.student_id),
            cell(&self.name),
            cell(&self.email),
            self.gateway.to_string(),
        ]
    }
}

pub fn sale_header() -> Vec<String> {
    SALE_COLUMNS.iter().map(|c| c.to_string()).collect()
}
