use chrono::NaiveDate;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parameters of one `GET /sales` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SalesQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub offset: usize,
    pub limit: usize,
}

impl SalesQuery {
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("paginate", "1".to_string()),
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
            ("data_inicio", self.start.format(DATE_FORMAT).to_string()),
            ("data_fim", self.end.format(DATE_FORMAT).to_string()),
        ]
    }
}
