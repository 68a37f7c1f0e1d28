//! The execution dialect.

use crate::printer::traits::SqlGenerator;

pub struct ClickHouseGenerator;

impl SqlGenerator for ClickHouseGenerator {
    fn dialect_name(&self) -> &'static str {
        "clickhouse"
    }

    fn parameterized(&self) -> bool {
        true
    }

    fn supports_settings(&self) -> bool {
        true
    }

    fn property_access(&self, base: String, keys: &[String]) -> String {
        let mut args = vec![base];
        args.extend(keys.iter().map(|k| self.string_literal(k)));
        format!("JSONExtractRaw({})", args.join(", "))
    }

    fn regex_match(&self, left: String, right: String, negated: bool) -> String {
        if negated {
            format!("NOT match({}, {})", left, right)
        } else {
            format!("match({}, {})", left, right)
        }
    }
}
