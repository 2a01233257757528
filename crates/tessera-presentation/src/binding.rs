use tessera_core::wire::PresentationProof;
use tessera_core::{AttributeProperties, ProtocolError};

/// Name of the attribute whose property bytes were disclosed at `position`.
///
/// Disclosed property slots are paired with committed value slots, so
/// position `k` of `D` names the attribute committed at position `k`.
pub(crate) fn bound_attribute_name(
    proof: &PresentationProof,
    position: usize,
) -> Result<String, ProtocolError> {
    let bytes = proof.disclosed_values.get(position).ok_or_else(|| {
        ProtocolError::Configuration(format!("no disclosed attribute at position {}", position))
    })?;
    Ok(AttributeProperties::from_bytes(bytes)?.name)
}

/// The attribute disclosed at `position` must be `expected`.
///
/// The disclosed index at `position` must also be the property slot of the
/// value committed at `position`, otherwise reordering either list would
/// bind a committed value to another attribute's name.
pub(crate) fn check_binding(
    proof: &PresentationProof,
    position: usize,
    expected: &str,
) -> Result<(), ProtocolError> {
    let requirements = &proof.requirements;
    let committed = requirements.committed_attributes.get(position).copied();
    let disclosed = requirements.disclosed_attributes.get(position).copied();
    match (committed, disclosed) {
        (Some(value), Some(property)) if value % 2 == 1 && property == value + 1 => {}
        _ => {
            return Err(ProtocolError::AttributeBinding {
                expected: expected.to_string(),
                found: format!(
                    "<disclosed {} is not the property slot of committed {}>",
                    slot(disclosed),
                    slot(committed)
                ),
            })
        }
    }

    let found = bound_attribute_name(proof, position).map_err(|_| {
        ProtocolError::AttributeBinding {
            expected: expected.to_string(),
            found: format!("<nothing at position {}>", position),
        }
    })?;
    if found != expected {
        return Err(ProtocolError::AttributeBinding {
            expected: expected.to_string(),
            found,
        });
    }
    Ok(())
}

fn slot(index: Option<usize>) -> String {
    index.map_or_else(|| "nothing".to_string(), |i| i.to_string())
}
