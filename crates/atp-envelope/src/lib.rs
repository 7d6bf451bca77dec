//! Ordinals-style inscription envelope: wraps a signed document's bytes for
//! a Taproot script-path witness, and parses them back out.
//!
//! ```text
//! OP_FALSE OP_IF
//!   PUSH3 "ord"
//!   PUSH1 0x01            content-type tag
//!   PUSH <content-type>
//!   OP_0                  body separator
//!   PUSH <body chunk ≤520 bytes>
//!   ...
//! OP_ENDIF
//! ```

use bitcoin::opcodes::all::{OP_ENDIF, OP_IF};
use bitcoin::opcodes::{OP_0, OP_FALSE};
use bitcoin::script::{Builder as ScriptBuilder, Instruction, PushBytesBuf};
use bitcoin::{ScriptBuf, Witness};

use atp_core::constants::{ENVELOPE_MARKER, MAX_ENVELOPE_CHUNK};
use atp_core::error::{EngineError, EngineResult};

/// Build the envelope script for `payload` tagged with `content_type`.
pub fn build(payload: &[u8], content_type: &str) -> EngineResult<ScriptBuf> {
    let mut builder = ScriptBuilder::new()
        .push_opcode(OP_FALSE)
        .push_opcode(OP_IF)
        .push_slice(push_bytes(ENVELOPE_MARKER.as_bytes())?)
        .push_slice(push_bytes(&[0x01])?)
        .push_slice(push_bytes(content_type.as_bytes())?)
        .push_opcode(OP_0);

    for chunk in payload.chunks(MAX_ENVELOPE_CHUNK) {
        builder = builder.push_slice(push_bytes(chunk)?);
    }

    Ok(builder.push_opcode(OP_ENDIF).into_script())
}

fn push_bytes(data: &[u8]) -> EngineResult<PushBytesBuf> {
    PushBytesBuf::try_from(data.to_vec())
        .map_err(|e| EngineError::CodecError(format!("envelope pushdata too large: {e}")))
}

/// Extracted envelope contents: the content-type string and the
/// concatenated, still-encoded document body.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ParsedEnvelope {
    pub content_type: String,
    pub body: Vec<u8>,
}

/// Try to locate and extract an inscription envelope from a single script.
/// Returns `None` (never an error) when the script doesn't contain one;
/// callers are expected to try several witness elements and move on.
fn parse_script(script: &ScriptBuf) -> Option<ParsedEnvelope> {
    let instructions: Vec<Instruction> = script.instructions().collect::<Result<_, _>>().ok()?;

    let marker_pos = instructions.iter().position(|ins| {
        matches!(ins, Instruction::PushBytes(p) if p.as_bytes() == ENVELOPE_MARKER.as_bytes())
    })?;

    let mut cursor = marker_pos + 1;
    let next = push_bytes_at(&instructions, cursor)?;
    cursor += 1;

    // Content-type tag: either "bare" (01 <ct>) or doubly-pushdata-wrapped
    // (01, then 01 again, then <ct>). Accept both forms.
    let content_type = if next.as_bytes() == [0x01] {
        let ct = push_bytes_at(&instructions, cursor)?;
        cursor += 1;
        if ct.as_bytes() == [0x01] {
            let inner = push_bytes_at(&instructions, cursor)?;
            cursor += 1;
            String::from_utf8(inner.as_bytes().to_vec()).ok()?
        } else {
            String::from_utf8(ct.as_bytes().to_vec()).ok()?
        }
    } else {
        return None;
    };

    // Body separator: OP_0, represented as an empty pushdata instruction.
    match instructions.get(cursor)? {
        Instruction::PushBytes(p) if p.as_bytes().is_empty() => {}
        Instruction::Op(op) if *op == OP_0 => {}
        _ => return None,
    }
    cursor += 1;

    let mut body = Vec::new();
    while let Some(Instruction::PushBytes(chunk)) = instructions.get(cursor) {
        body.extend_from_slice(chunk.as_bytes());
        cursor += 1;
    }

    Some(ParsedEnvelope { content_type, body })
}

fn push_bytes_at<'a>(instructions: &'a [Instruction], idx: usize) -> Option<&'a bitcoin::script::PushBytes> {
    match instructions.get(idx)? {
        Instruction::PushBytes(p) => Some(p),
        _ => None,
    }
}

/// Try every witness element from last to first, returning the first one
/// that parses as an envelope. Elements that aren't envelopes (signatures,
/// control blocks) are silently skipped, per the "try each, skip failures"
/// contract.
pub fn parse_witness(witness: &Witness) -> EngineResult<ParsedEnvelope> {
    let elements: Vec<&[u8]> = witness.iter().collect();
    for element in elements.into_iter().rev() {
        let script = ScriptBuf::from_bytes(element.to_vec());
        if let Some(envelope) = parse_script(&script) {
            return Ok(envelope);
        }
    }
    Err(EngineError::NoInscription)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_small_payload() {
        let payload = b"{\"t\":\"hb\"}";
        let script = build(payload, "application/atp.v1+json").unwrap();
        let mut witness = Witness::new();
        witness.push(script.as_bytes());
        let parsed = parse_witness(&witness).unwrap();
        assert_eq!(parsed.content_type, "application/atp.v1+json");
        assert_eq!(parsed.body, payload);
    }

    #[test]
    fn round_trips_payload_spanning_multiple_chunks() {
        let payload = vec![0xABu8; MAX_ENVELOPE_CHUNK * 3 + 17];
        let script = build(&payload, "application/atp.v1+cbor").unwrap();
        let mut witness = Witness::new();
        witness.push(script.as_bytes());
        let parsed = parse_witness(&witness).unwrap();
        assert_eq!(parsed.body, payload);
    }

    #[test]
    fn skips_non_envelope_elements_and_finds_the_real_one() {
        let payload = b"identity payload";
        let script = build(payload, "application/atp.v1+json").unwrap();
        let mut witness = Witness::new();
        witness.push([0xDE, 0xAD, 0xBE, 0xEF]); // looks like a signature element
        witness.push(script.as_bytes());
        witness.push([0x51]); // a trailing control-block-ish element
        let parsed = parse_witness(&witness).unwrap();
        assert_eq!(parsed.body, payload);
    }

    #[test]
    fn witness_with_no_inscription_is_rejected() {
        let mut witness = Witness::new();
        witness.push([0x01, 0x02, 0x03]);
        let err = parse_witness(&witness).unwrap_err();
        assert!(matches!(err, EngineError::NoInscription));
    }
}
