//! CE135 — Work-report distribution, CE136 — Work-report request.

use jamnp_core::error::CodecError;
use jamnp_core::ids::{Ed25519Signature, Hash, Slot, ValidatorIndex};

use super::{decode_blob, decode_seq, encode_blob, encode_seq, take_fixed};

/// One validator's attestation signature over a work report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuarantorSignature {
    pub validator_index: ValidatorIndex,
    pub signature: Ed25519Signature,
}

/// `len‖WorkReport ‖ slot(4 LE) ‖ len‖(valIdx(2)‖sig(64))*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkReportDistribution {
    pub work_report: Vec<u8>,
    pub slot: Slot,
    pub signatures: Vec<GuarantorSignature>,
}

/// `wrHash(32)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkReportRequest {
    pub work_report_hash: Hash,
}

fn encode_signature(sig: &GuarantorSignature) -> Vec<u8> {
    let mut out = Vec::with_capacity(66);
    out.extend_from_slice(&sig.validator_index.to_le_bytes());
    out.extend_from_slice(&sig.signature);
    out
}

fn decode_signature(buf: &[u8]) -> Result<(GuarantorSignature, usize), CodecError> {
    let (idx_bytes, rest) = take_fixed::<2>(buf, "GuarantorSignature.validator_index")?;
    let (signature, _rest) = take_fixed::<64>(rest, "GuarantorSignature.signature")?;
    Ok((GuarantorSignature { validator_index: u16::from_le_bytes(idx_bytes), signature }, 66))
}

pub fn encode_distribution(msg: &WorkReportDistribution) -> Vec<u8> {
    let mut out = encode_blob(&msg.work_report);
    out.extend_from_slice(&msg.slot.to_le_bytes());
    out.extend(encode_seq(&msg.signatures, encode_signature));
    out
}

pub fn decode_distribution(buf: &[u8]) -> Result<WorkReportDistribution, CodecError> {
    let (work_report, consumed) = decode_blob(buf)?;
    let (slot_bytes, rest) = take_fixed::<4>(&buf[consumed..], "WorkReportDistribution.slot")?;
    let (signatures, _consumed) = decode_seq(rest, decode_signature)?;
    Ok(WorkReportDistribution { work_report, slot: u32::from_le_bytes(slot_bytes), signatures })
}

pub fn encode_request(req: &WorkReportRequest) -> Vec<u8> {
    req.work_report_hash.to_vec()
}

pub fn decode_request(buf: &[u8]) -> Result<WorkReportRequest, CodecError> {
    let (work_report_hash, _rest) = take_fixed::<32>(buf, "WorkReportRequest.work_report_hash")?;
    Ok(WorkReportRequest { work_report_hash })
}

/// The response to CE136 is the opaque `WorkReport` bytes, the whole frame.
pub fn encode_response(work_report: &[u8]) -> Vec<u8> {
    work_report.to_vec()
}

pub fn decode_response(buf: &[u8]) -> Vec<u8> {
    buf.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distribution_round_trips() {
        let msg = WorkReportDistribution {
            work_report: vec![1, 2, 3, 4],
            slot: 42,
            signatures: vec![
                GuarantorSignature { validator_index: 0, signature: [1; 64] },
                GuarantorSignature { validator_index: 9, signature: [2; 64] },
            ],
        };
        let encoded = encode_distribution(&msg);
        assert_eq!(decode_distribution(&encoded).unwrap(), msg);
    }

    #[test]
    fn request_and_response_round_trip() {
        let req = WorkReportRequest { work_report_hash: [7; 32] };
        let encoded = encode_request(&req);
        assert_eq!(encoded.len(), 32);
        assert_eq!(decode_request(&encoded).unwrap(), req);

        let response = vec![9u8; 512];
        assert_eq!(decode_response(&encode_response(&response)), response);
    }
}
