//! Require rewriting: points module references at slots of the design document.

use crate::js::{self, JsError};
use crate::slots::Slot;
use std::fmt;

/// Where a rewritten `require` points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    /// `commons/<slot>`, for non-view entries
    Commons(Slot),
    /// `views/lib/<slot>`, for view entries
    ViewLib(Slot),
    /// `./<slot>`, from one library module to another
    Relative(Slot),
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Commons(slot) => write!(f, "commons/{}", slot),
            Address::ViewLib(slot) => write!(f, "views/lib/{}", slot),
            Address::Relative(slot) => write!(f, "./{}", slot),
        }
    }
}

/// Replace the argument of every `require('<literal>')` for which `lookup`
/// returns an address
///
/// Everything else, including strings and comments that merely mention
/// `require`, is copied through unchanged. With no matches the output equals
/// the input.
pub fn rewrite_requires(
    source: &str,
    mut lookup: impl FnMut(&str) -> Option<String>,
) -> Result<String, JsError> {
    let tree = js::parse(source)?;
    let calls = js::require_calls(&tree, source);

    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    for call in calls {
        let Some(address) = lookup(&call.literal) else {
            continue;
        };
        out.push_str(&source[last..call.range.start]);
        out.push_str(&quote(&address));
        last = call.range.end;
    }
    out.push_str(&source[last..]);

    Ok(out)
}

fn quote(address: &str) -> String {
    serde_json::Value::String(address.to_string()).to_string()
}
