//! The display dialect: echoes the query back to users with inline
//! constants and source-level names.

use crate::printer::traits::SqlGenerator;

pub struct ReadableGenerator;

impl SqlGenerator for ReadableGenerator {
    fn dialect_name(&self) -> &'static str {
        "readable"
    }

    fn parameterized(&self) -> bool {
        false
    }

    fn supports_settings(&self) -> bool {
        false
    }

    fn property_access(&self, base: String, keys: &[String]) -> String {
        let mut out = base;
        for key in keys {
            out.push('.');
            out.push_str(&self.quote_identifier(key));
        }
        out
    }

    fn regex_match(&self, left: String, right: String, negated: bool) -> String {
        if negated {
            format!("{} !~ {}", left, right)
        } else {
            format!("{} =~ {}", left, right)
        }
    }
}
