//! CE144 — Audit announcement.

use jamnp_core::error::CodecError;
use jamnp_core::ids::{CoreIndex, Ed25519Signature, Hash};

use super::{decode_blob, decode_seq, encode_blob, encode_seq, take_fixed};

/// One `(coreIdx‖wrHash)` pair naming a work report under audit in this tranche.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditedReport {
    pub core_index: CoreIndex,
    pub work_report_hash: Hash,
}

/// `hdrHash(32) ‖ tranche(4) ‖ len‖(coreIdx‖wrHash)* ‖ sig(64) ‖ len‖evidence`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditAnnouncement {
    pub header_hash: Hash,
    pub tranche: u32,
    pub reports: Vec<AuditedReport>,
    pub signature: Ed25519Signature,
    pub evidence: Vec<u8>,
}

fn encode_report(r: &AuditedReport) -> Vec<u8> {
    let mut out = Vec::with_capacity(36);
    out.extend_from_slice(&(r.core_index as u32).to_le_bytes());
    out.extend_from_slice(&r.work_report_hash);
    out
}

fn decode_report(buf: &[u8]) -> Result<(AuditedReport, usize), CodecError> {
    let (core_bytes, rest) = take_fixed::<4>(buf, "AuditedReport.core_index")?;
    let (work_report_hash, _rest) = take_fixed::<32>(rest, "AuditedReport.work_report_hash")?;
    Ok((AuditedReport { core_index: u32::from_le_bytes(core_bytes) as CoreIndex, work_report_hash }, 36))
}

pub fn encode(msg: &AuditAnnouncement) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&msg.header_hash);
    out.extend_from_slice(&msg.tranche.to_le_bytes());
    out.extend(encode_seq(&msg.reports, encode_report));
    out.extend_from_slice(&msg.signature);
    out.extend(encode_blob(&msg.evidence));
    out
}

pub fn decode(buf: &[u8]) -> Result<AuditAnnouncement, CodecError> {
    let (header_hash, rest) = take_fixed::<32>(buf, "AuditAnnouncement.header_hash")?;
    let (tranche_bytes, rest) = take_fixed::<4>(rest, "AuditAnnouncement.tranche")?;
    let (reports, consumed) = decode_seq(rest, decode_report)?;
    let (signature, rest) = take_fixed::<64>(&rest[consumed..], "AuditAnnouncement.signature")?;
    let (evidence, _consumed) = decode_blob(rest)?;
    Ok(AuditAnnouncement { header_hash, tranche: u32::from_le_bytes(tranche_bytes), reports, signature, evidence })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let msg = AuditAnnouncement {
            header_hash: [1; 32],
            tranche: 3,
            reports: vec![
                AuditedReport { core_index: 0, work_report_hash: [2; 32] },
                AuditedReport { core_index: 1, work_report_hash: [3; 32] },
            ],
            signature: [4; 64],
            evidence: vec![5; 20],
        };
        let encoded = encode(&msg);
        assert_eq!(decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn round_trips_with_empty_evidence_and_reports() {
        let msg = AuditAnnouncement { header_hash: [0; 32], tranche: 0, reports: vec![], signature: [0; 64], evidence: vec![] };
        let encoded = encode(&msg);
        assert_eq!(decode(&encoded).unwrap(), msg);
    }
}
