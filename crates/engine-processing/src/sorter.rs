use engine_config::settings::SortDirection;
use model::records::sale::SaleRecord;
use std::cmp::Ordering;

/// Orders records by completion time, ties broken by ascending transaction
/// id so the output does not depend on input order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sorter {
    direction: SortDirection,
}

impl Sorter {
    pub fn new(direction: SortDirection) -> Self {
        Sorter { direction }
    }

    pub fn order(&self, mut records: Vec<SaleRecord>) -> Vec<SaleRecord> {
        records.sort_by(|a, b| self.compare(a, b));
        records
    }

    fn compare(&self, a: &SaleRecord, b: &SaleRecord) -> Ordering {
        let by_time = match self.direction {
            SortDirection::Ascending => a.completed_at.cmp(&b.completed_at),
            SortDirection::Descending => b.completed_at.cmp(&a.completed_at),
        };
        by_time.then_with(|| a.transaction_id.cmp(&b.transaction_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn sale(id: &str, completed: &str) -> SaleRecord {
        SaleRecord {
            sale_id: None,
            transaction_id: id.into(),
            product_id: None,
            net_amount: None,
            completed_at: NaiveDateTime::parse_from_str(completed, "%Y-%m-%d %H:%M:%S").unwrap(),
            payment_type: 1,
            status: 2,
            gateway: 6,
            student_id: None,
            name: None,
            email: None,
        }
    }

    fn ids(records: &[SaleRecord]) -> Vec<&str> {
        records.iter().map(|r| r.transaction_id.as_str()).collect()
    }

    fn input() -> Vec<SaleRecord> {
        vec![
            sale("c", "2024-03-10 08:00:00"),
            sale("a", "2024-03-12 09:00:00"),
            sale("b", "2024-03-10 08:00:00"),
            sale("d", "2024-03-05 17:45:00"),
        ]
    }

    #[test]
    fn descending_by_default() {
        let sorted = Sorter::default().order(input());
        assert_eq!(ids(&sorted), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn ascending_keeps_id_tie_break() {
        let sorted = Sorter::new(SortDirection::Ascending).order(input());
        assert_eq!(ids(&sorted), vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn output_is_independent_of_input_order() {
        let sorter = Sorter::new(SortDirection::Ascending);
        let mut reversed = input();
        reversed.reverse();

        assert_eq!(sorter.order(input()), sorter.order(reversed));
    }
}
