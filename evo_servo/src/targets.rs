//! `ID=DEG` target specs from the command line.
//!
//! `all=V` applies to every configured axis; an explicit `ID=V` overrides it
//! wherever it appears in the list.

use crate::command::DegreeMap;
use crate::error::ServoError;
use evo_common::servo::types::AxisId;

/// Parse `specs` against the configured `ids`.
///
/// # Errors
/// `InvalidConfiguration` for a spec without `=`, a non-finite or unparsable
/// value, or an axis that is not configured.
pub fn parse_targets<S: AsRef<str>>(specs: &[S], ids: &[AxisId]) -> Result<DegreeMap, ServoError> {
    let mut all = None;
    let mut overrides = DegreeMap::new();

    for spec in specs {
        let spec = spec.as_ref();
        let (key, value) = spec
            .split_once('=')
            .ok_or_else(|| invalid(format!("target '{spec}' must be ID=DEG or all=DEG")))?;
        let value: f64 = value
            .trim()
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite())
            .ok_or_else(|| invalid(format!("target '{spec}': invalid angle")))?;

        match key.trim() {
            "all" => all = Some(value),
            id => {
                let axis: AxisId = id
                    .parse()
                    .map_err(|_| invalid(format!("target '{spec}': invalid axis ID")))?;
                if !ids.contains(&axis) {
                    return Err(invalid(format!("target '{spec}': axis {axis} is not configured")));
                }
                overrides.insert(axis, value);
            }
        }
    }

    let mut targets: DegreeMap = match all {
        Some(value) => ids.iter().map(|&id| (id, value)).collect(),
        None => DegreeMap::new(),
    };
    targets.extend(overrides);
    Ok(targets)
}

fn invalid(msg: String) -> ServoError {
    ServoError::InvalidConfiguration(msg)
}
